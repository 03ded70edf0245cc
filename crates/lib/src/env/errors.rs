//! Error types for the environment configurator
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Failed to access environment file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed line {line} in environment file {}", path.display())]
    Malformed { path: PathBuf, line: usize },

    #[error("Invalid environment variable name: {name}")]
    InvalidName { name: String },

    /// The env file is line-based; a value spanning lines could not be read back.
    #[error("Value of environment variable {name} contains a line break")]
    MultilineValue { name: String },

    #[error("Environment write was rejected")]
    WriteRejected,
}

impl EnvError {
    /// Check if this error came from the filesystem.
    pub fn is_io_error(&self) -> bool {
        matches!(self, EnvError::Io { .. })
    }
}

impl From<EnvError> for crate::Error {
    fn from(err: EnvError) -> Self {
        crate::Error::Env(err)
    }
}
