//! Identity records and the registry that stores them
//!
//! An [`Identity`] is the full description of one Git hosting account. The
//! transaction engine treats it as read-only; the registry owns creation and
//! removal.

pub mod errors;
pub mod registry;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use errors::IdentityError;
pub use registry::{IdentityRegistry, JsonRegistry};

fn default_true() -> bool {
    true
}

/// One Git hosting account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Unique key, e.g. `work` or `personal`
    pub alias: String,

    /// Display name written to `user.name`
    pub name: String,

    /// Written to `user.email`
    pub email: String,

    /// Private key file; the matching public key is expected at `<path>.pub`
    #[serde(default)]
    pub ssh_key_path: Option<PathBuf>,

    /// Username on the hosting platform, used to detect token leakage
    pub username: String,

    /// Optional `user.signingkey`
    #[serde(default)]
    pub signing_key: Option<String>,

    #[serde(default = "default_true")]
    pub requires_ssh_isolation: bool,

    #[serde(default = "default_true")]
    pub requires_token_isolation: bool,
}

impl Identity {
    /// Create an identity with both isolation flags enabled and no SSH key.
    pub fn new(
        alias: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            name: name.into(),
            email: email.into(),
            ssh_key_path: None,
            username: username.into(),
            signing_key: None,
            requires_ssh_isolation: true,
            requires_token_isolation: true,
        }
    }

    /// Builder-style setter for the SSH key path.
    pub fn with_ssh_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssh_key_path = Some(path.into());
        self
    }

    /// Builder-style setter for the signing key.
    pub fn with_signing_key(mut self, key: impl Into<String>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// The private key path, or an error naming this identity if none is set.
    pub fn require_ssh_key(&self) -> Result<&Path, IdentityError> {
        self.ssh_key_path
            .as_deref()
            .ok_or_else(|| IdentityError::MissingField {
                alias: self.alias.clone(),
                field: "ssh_key_path",
            })
    }

    /// Check the record is well formed.
    pub fn validate(&self) -> Result<(), IdentityError> {
        validate_alias(&self.alias)?;
        if self.name.trim().is_empty() {
            return Err(IdentityError::MissingField {
                alias: self.alias.clone(),
                field: "name",
            });
        }
        if self.username.trim().is_empty() {
            return Err(IdentityError::MissingField {
                alias: self.alias.clone(),
                field: "username",
            });
        }
        let email_ok = self
            .email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !email_ok {
            return Err(IdentityError::InvalidEmail {
                email: self.email.clone(),
            });
        }
        if self.requires_ssh_isolation {
            self.require_ssh_key()?;
        }
        Ok(())
    }
}

/// Aliases double as file names (agent sockets), so keep them path-safe.
pub fn validate_alias(alias: &str) -> Result<(), IdentityError> {
    let valid = !alias.is_empty()
        && alias.len() <= 64
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(IdentityError::InvalidAlias {
            alias: alias.to_string(),
        })
    }
}
