//! Tool configuration
//!
//! Everything lives under one data directory. `config.json` there is
//! optional; a missing file or missing field falls back to the defaults
//! below.

pub mod duration_secs;
pub mod errors;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use url::Url;

pub use errors::ConfigError;

use crate::{
    Result,
    constants::{
        ACCOUNTS_FILE, AGENTS_DIR, CONFIG_FILE, ENV_FILE, GITHUB_API_URL, LOCK_FILE, STATE_FILE,
        TOKENS_FILE,
    },
    persist,
    ssh::SshIsolationConfig,
    transaction::TransactionOptions,
};

fn default_api_url() -> Url {
    Url::parse(GITHUB_API_URL).expect("GITHUB_API_URL is a valid URL")
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Defaults for every switch; CLI flags override per invocation.
    pub transaction: TransactionOptions,

    pub ssh: SshIsolationConfig,

    /// Base URL of the hosting platform's REST API.
    pub api_url: Url,

    /// Confirm tokens against the platform during isolation checks.
    pub validate_tokens_online: bool,

    /// Bound on each `git`/`ssh-add` invocation.
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transaction: TransactionOptions::default(),
            ssh: SshIsolationConfig::default(),
            api_url: default_api_url(),
            validate_tokens_online: false,
            command_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load `config.json` from `data_dir`, or the defaults if it does not exist.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let config = match persist::read_json::<Config>(&path).await {
            Ok(config) => config.unwrap_or_default(),
            Err(crate::Error::Serialize(e)) => {
                return Err(ConfigError::Parse {
                    path,
                    reason: e.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e),
        };
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.transaction.concurrent_steps {
            return Err(ConfigError::Invalid {
                field: "transaction.concurrent_steps",
                reason: "steps always run sequentially".to_string(),
            });
        }
        let timeouts = [
            ("transaction.timeout", self.transaction.timeout),
            ("ssh.socket_timeout", self.ssh.socket_timeout),
            ("ssh.key_load_timeout", self.ssh.key_load_timeout),
            ("command_timeout", self.command_timeout),
        ];
        for (field, value) in timeouts {
            if value.is_zero() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Well-known file locations inside the data directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$XDG_CONFIG_HOME/gitswitch` or the platform equivalent.
    pub fn default_location() -> std::result::Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("gitswitch"))
            .ok_or(ConfigError::NoDataDir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn accounts(&self) -> PathBuf {
        self.root.join(ACCOUNTS_FILE)
    }

    pub fn state(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    pub fn tokens(&self) -> PathBuf {
        self.root.join(TOKENS_FILE)
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(ENV_FILE)
    }

    pub fn lock(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn agents(&self) -> PathBuf {
        self.root.join(AGENTS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config, Config::default());
        assert!(config.transaction.rollback_on_failure);
        assert_eq!(config.api_url.as_str(), "https://api.github.com/");
    }

    #[tokio::test]
    async fn partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"transaction": {"timeout": 5, "strict_validation": true}, "ssh": {"force_identities_only": false}}"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.transaction.timeout, Duration::from_secs(5));
        assert!(config.transaction.strict_validation);
        assert!(config.transaction.validate_after_switch);
        assert!(!config.ssh.force_identities_only);
        assert_eq!(config.ssh.socket_timeout, SshIsolationConfig::default().socket_timeout);
    }

    #[tokio::test]
    async fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        std::fs::write(&path, r#"{"transaction": {"concurrent_steps": true}}"#).unwrap();
        let err = Config::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, crate::Error::Config(ConfigError::Invalid { .. })));

        std::fs::write(&path, "{not json").unwrap();
        let err = Config::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, crate::Error::Config(ConfigError::Parse { .. })));
    }
}
