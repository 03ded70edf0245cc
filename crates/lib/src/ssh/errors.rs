//! Error types for SSH isolation
use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::process::ProcessError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SshError {
    #[error("SSH key not found: {}", path.display())]
    KeyNotFound { path: PathBuf },

    #[error("SSH key is not readable: {}: {reason}", path.display())]
    KeyNotReadable { path: PathBuf, reason: String },

    #[error("Public key not found next to private key: {}", path.display())]
    PublicKeyMissing { path: PathBuf },

    #[error("Malformed public key in {}", path.display())]
    MalformedPublicKey { path: PathBuf },

    #[error("Identity '{alias}' has no SSH key configured")]
    NoKeyConfigured { alias: String },

    #[error("ssh-agent at {} is not reachable", socket.display())]
    AgentUnavailable { socket: PathBuf },

    #[error("Failed to load key {} into agent: {reason}", path.display())]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("Agent operation '{operation}' failed: {reason}")]
    AgentCommand { operation: &'static str, reason: String },

    #[error("Agent operation '{operation}' timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The agent exposes keys other than (or instead of) the target's key.
    #[error("SSH isolation violation for '{alias}': expected only {expected}, agent holds [{}]", found.join(", "))]
    IsolationViolation {
        alias: String,
        expected: String,
        found: Vec<String>,
    },

    /// The agent was reset but keys it held at snapshot time could not be reloaded.
    #[error("Agent for '{alias}' restored without [{}]", lost.join(", "))]
    RestoreIncomplete { alias: String, lost: Vec<String> },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl SshError {
    /// Check if the key file is absent or unusable.
    pub fn is_key_missing(&self) -> bool {
        matches!(
            self,
            SshError::KeyNotFound { .. }
                | SshError::KeyNotReadable { .. }
                | SshError::PublicKeyMissing { .. }
                | SshError::NoKeyConfigured { .. }
        )
    }

    /// Check if the agent exposes the wrong keys.
    pub fn is_isolation_violation(&self) -> bool {
        matches!(self, SshError::IsolationViolation { .. })
    }

    /// Check if a restore left the agent different from its snapshot.
    pub fn is_restore_incomplete(&self) -> bool {
        matches!(self, SshError::RestoreIncomplete { .. })
    }

    /// Check if an agent operation or child process timed out.
    pub fn is_timeout(&self) -> bool {
        match self {
            SshError::Timeout { .. } => true,
            SshError::Process(p) => p.is_timeout(),
            _ => false,
        }
    }
}

impl From<SshError> for crate::Error {
    fn from(err: SshError) -> Self {
        crate::Error::Ssh(err)
    }
}
