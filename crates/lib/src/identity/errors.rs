//! Error types for identity records and the identity registry
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity not found: {alias}")]
    NotFound { alias: String },

    #[error("Identity already exists: {alias}")]
    AlreadyExists { alias: String },

    #[error("Invalid alias '{alias}': use letters, digits, '-' or '_'")]
    InvalidAlias { alias: String },

    #[error("Invalid email address: {email}")]
    InvalidEmail { email: String },

    #[error("Identity '{alias}' is missing required field: {field}")]
    MissingField { alias: String, field: &'static str },
}

impl IdentityError {
    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IdentityError::NotFound { .. })
    }

    /// Check if this error is about a malformed record rather than lookup.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            IdentityError::InvalidAlias { .. }
                | IdentityError::InvalidEmail { .. }
                | IdentityError::MissingField { .. }
        )
    }
}

impl From<IdentityError> for crate::Error {
    fn from(err: IdentityError) -> Self {
        crate::Error::Identity(err)
    }
}
