//!
//! gitswitch: hold several Git hosting identities on one machine and switch between them
//! without one identity's SSH key or API token bleeding into another.
//!
//! ## Core Concepts
//!
//! * **Identities (`identity::Identity`)**: One alias mapped to a name, email, SSH key and platform username.
//! * **Token isolation (`token::TokenIsolationStore`)**: A per-identity credential vault that detects cross-identity leakage.
//! * **SSH isolation (`ssh::SshIsolationManager`)**: Per-identity agent sockets that expose exactly one private key.
//! * **Git configuration (`git::GitConfigWriter`)**: Applies `user.name`/`user.email` to the global or a local scope.
//! * **Environment (`env::EnvironmentConfigurator`)**: Shell exports that make the isolated key effective.
//! * **Transactions (`transaction::Transaction`)**: Orders the above into steps, validates before and after,
//!   and rolls back in reverse on failure.
//! * **Switcher (`switcher::Switcher`)**: Host-level glue that looks up identities, runs a transaction
//!   and persists the current identity pointer only after a completed switch.

pub mod clock;
pub mod config;
pub mod constants;
pub mod env;
pub mod git;
pub mod identity;
pub mod persist;
pub mod process;
pub mod ssh;
pub mod state;
pub mod switcher;
pub mod testing;
pub mod token;
pub mod transaction;

pub use clock::{Clock, FixedClock, SystemClock};
pub use identity::Identity;
pub use switcher::{SwitchRequest, Switcher};
pub use transaction::{FinalState, Transaction, TransactionOptions, TransactionResult};

/// Result type used throughout the gitswitch library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the gitswitch library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured identity errors from the identity module
    #[error(transparent)]
    Identity(identity::IdentityError),

    /// Structured token errors from the token module
    #[error(transparent)]
    Token(token::TokenError),

    /// Structured SSH errors from the ssh module
    #[error(transparent)]
    Ssh(ssh::SshError),

    /// Structured Git configuration errors from the git module
    #[error(transparent)]
    Git(git::GitConfigError),

    /// Structured environment errors from the env module
    #[error(transparent)]
    Env(env::EnvError),

    /// Structured transaction errors from the transaction module
    #[error(transparent)]
    Transaction(transaction::TransactionError),

    /// Structured state errors from the state module
    #[error(transparent)]
    State(state::StateError),

    /// Structured configuration errors from the config module
    #[error(transparent)]
    Config(config::ConfigError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Identity(_) => "identity",
            Error::Token(_) => "token",
            Error::Ssh(_) => "ssh",
            Error::Git(_) => "git",
            Error::Env(_) => "env",
            Error::Transaction(_) => "transaction",
            Error::State(_) => "state",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Identity(err) => err.is_not_found(),
            Error::Token(err) => err.is_not_found(),
            Error::Ssh(err) => err.is_key_missing(),
            _ => false,
        }
    }

    /// Check if this error means a key or token belongs to the wrong identity.
    ///
    /// Isolation violations are always fatal to a switch.
    pub fn is_isolation_violation(&self) -> bool {
        match self {
            Error::Token(err) => err.is_isolation_violation(),
            Error::Ssh(err) => err.is_isolation_violation(),
            Error::Transaction(err) => err.is_isolation_violation(),
            _ => false,
        }
    }

    /// Check if this error indicates a timeout.
    pub fn is_timeout_error(&self) -> bool {
        match self {
            Error::Ssh(err) => err.is_timeout(),
            Error::Git(err) => err.is_timeout(),
            Error::Transaction(err) => err.is_timeout(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Env(err) => err.is_io_error(),
            Error::State(err) => err.is_io_error(),
            _ => false,
        }
    }

    /// Check if this error is validation-related.
    pub fn is_validation_error(&self) -> bool {
        match self {
            Error::Identity(err) => err.is_validation_error(),
            Error::Transaction(err) => err.is_validation_error(),
            _ => false,
        }
    }
}
