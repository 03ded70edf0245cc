//! Git identity configuration
//!
//! Only the three keys that carry an identity are managed: `user.name`,
//! `user.email` and `user.signingkey`. Everything else in the user's Git
//! config is left alone.

pub mod cli;
pub mod errors;
pub mod memory;

use std::{fmt, path::PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use cli::GitCli;
pub use errors::GitConfigError;
pub use memory::MemoryGitConfig;

use crate::{Identity, Result};

pub const USER_NAME: &str = "user.name";
pub const USER_EMAIL: &str = "user.email";
pub const USER_SIGNING_KEY: &str = "user.signingkey";

/// Which Git config file a switch writes to.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "scope", content = "path")]
pub enum ConfigScope {
    /// `~/.gitconfig` (or `$GIT_CONFIG_GLOBAL`)
    #[default]
    Global,
    /// `.git/config` of the repository at the given path
    Local(PathBuf),
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScope::Global => write!(f, "global"),
            ConfigScope::Local(path) => write!(f, "local ({})", path.display()),
        }
    }
}

/// Values of the identity keys in one scope. `None` means the key is unset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitIdentityConfig {
    pub name: Option<String>,
    pub email: Option<String>,
    pub signing_key: Option<String>,
}

impl GitIdentityConfig {
    /// The values a switch to `identity` writes.
    ///
    /// An identity without a signing key unsets `user.signingkey` so the
    /// previous identity's key is not left behind.
    pub fn for_identity(identity: &Identity) -> Self {
        Self {
            name: Some(identity.name.clone()),
            email: Some(identity.email.clone()),
            signing_key: identity.signing_key.clone(),
        }
    }

    /// `(key, value)` pairs in write order.
    pub fn entries(&self) -> [(&'static str, Option<&str>); 3] {
        [
            (USER_NAME, self.name.as_deref()),
            (USER_EMAIL, self.email.as_deref()),
            (USER_SIGNING_KEY, self.signing_key.as_deref()),
        ]
    }
}

/// Reads and writes the identity keys of a Git config scope.
#[async_trait]
pub trait GitConfigWriter: Send + Sync {
    async fn read(&self, scope: &ConfigScope) -> Result<GitIdentityConfig>;

    /// Set every key in `config`; `None` values are unset.
    async fn write(&self, scope: &ConfigScope, config: &GitIdentityConfig) -> Result<()>;
}
