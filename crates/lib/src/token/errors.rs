//! Error types for the token isolation store
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TokenError {
    /// No token is configured for the alias. Not fatal: the account is usable over SSH only.
    #[error("No token configured for '{alias}'")]
    NotFound { alias: String },

    /// The stored token belongs to a different platform user than expected.
    #[error("Token isolation violation for '{alias}': expected user '{expected}', token belongs to '{actual}'")]
    IsolationViolation {
        alias: String,
        expected: String,
        actual: String,
    },

    #[error("Token for '{alias}' is invalid")]
    Invalid { alias: String },

    #[error("Token for '{alias}' expired at {expired_at}")]
    Expired { alias: String, expired_at: String },

    /// The platform rejected the token outright (HTTP 401).
    #[error("Token was rejected by the platform")]
    Rejected,

    #[error("Token validation request failed with HTTP status {status}")]
    ValidationRequest { status: u16 },

    #[error("Token validation request failed: {reason}")]
    Network { reason: String },

    #[error("Token store write failed: {reason}")]
    StoreWrite { reason: String },
}

impl TokenError {
    /// Check if this error means no token is configured.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TokenError::NotFound { .. })
    }

    /// Check if the token belongs to the wrong identity.
    pub fn is_isolation_violation(&self) -> bool {
        matches!(self, TokenError::IsolationViolation { .. })
    }

    /// Check if the token exists but cannot be used.
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            TokenError::Invalid { .. } | TokenError::Expired { .. } | TokenError::Rejected
        )
    }
}

impl From<TokenError> for crate::Error {
    fn from(err: TokenError) -> Self {
        crate::Error::Token(err)
    }
}
