//! Error types for Git configuration access
use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GitConfigError {
    #[error("git config {operation} '{key}' failed (exit {status:?}): {stderr}")]
    CommandFailed {
        operation: &'static str,
        key: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("Not a Git repository: {}", path.display())]
    NotARepository { path: PathBuf },

    #[error("Write to '{key}' was rejected")]
    WriteRejected { key: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl GitConfigError {
    /// Check if the `git` child process timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GitConfigError::Process(p) if p.is_timeout())
    }

    /// Check if the scope points at something that is not a repository.
    pub fn is_not_a_repository(&self) -> bool {
        matches!(self, GitConfigError::NotARepository { .. })
    }
}

impl From<GitConfigError> for crate::Error {
    fn from(err: GitConfigError) -> Self {
        crate::Error::Git(err)
    }
}
