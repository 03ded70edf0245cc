//! [`GitConfigWriter`] backed by the `git config` command.

use std::{ffi::OsStr, path::PathBuf, time::Duration};

use async_trait::async_trait;

use super::{ConfigScope, GitConfigError, GitConfigWriter, GitIdentityConfig};
use crate::{Result, process};

// `git config --get` exits 1 for a missing key; `--unset` exits 5.
const EXIT_KEY_MISSING: i32 = 1;
const EXIT_NOTHING_TO_UNSET: i32 = 5;

#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout: Duration,
    /// Overrides `$GIT_CONFIG_GLOBAL` for every invocation.
    global_file: Option<PathBuf>,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
            global_file: None,
        }
    }

    /// Point global-scope operations at `path` instead of `~/.gitconfig`.
    pub fn with_global_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_file = Some(path.into());
        self
    }

    fn scope_args(scope: &ConfigScope) -> Vec<String> {
        match scope {
            ConfigScope::Global => vec!["config".into(), "--global".into()],
            ConfigScope::Local(path) => vec![
                "-C".into(),
                path.display().to_string(),
                "config".into(),
                "--local".into(),
            ],
        }
    }

    async fn git(&self, args: Vec<String>) -> Result<process::CommandOutput> {
        let mut envs: Vec<(&str, &OsStr)> = Vec::new();
        if let Some(file) = &self.global_file {
            envs.push(("GIT_CONFIG_GLOBAL", file.as_os_str()));
        }
        process::run(&self.program, &args, &envs, self.timeout)
            .await
            .map_err(|e| GitConfigError::from(e).into())
    }

    async fn ensure_repository(&self, scope: &ConfigScope) -> Result<()> {
        let ConfigScope::Local(path) = scope else {
            return Ok(());
        };
        let output = self
            .git(vec![
                "-C".into(),
                path.display().to_string(),
                "rev-parse".into(),
                "--git-dir".into(),
            ])
            .await?;
        if output.success() {
            Ok(())
        } else {
            Err(GitConfigError::NotARepository { path: path.clone() }.into())
        }
    }

    async fn get(&self, scope: &ConfigScope, key: &str) -> Result<Option<String>> {
        let mut args = Self::scope_args(scope);
        args.extend(["--get".to_string(), key.to_string()]);
        let output = self.git(args).await?;
        match output.status {
            Some(0) => Ok(Some(output.stdout.trim_end_matches(['\r', '\n']).to_string())),
            Some(EXIT_KEY_MISSING) => Ok(None),
            status => Err(GitConfigError::CommandFailed {
                operation: "get",
                key: key.to_string(),
                status,
                stderr: output.stderr.trim().to_string(),
            }
            .into()),
        }
    }

    async fn set(&self, scope: &ConfigScope, key: &str, value: Option<&str>) -> Result<()> {
        let mut args = Self::scope_args(scope);
        let operation = match value {
            Some(value) => {
                args.extend([key.to_string(), value.to_string()]);
                "set"
            }
            None => {
                args.extend(["--unset".to_string(), key.to_string()]);
                "unset"
            }
        };
        let output = self.git(args).await?;
        match output.status {
            Some(0) => Ok(()),
            Some(EXIT_NOTHING_TO_UNSET) if value.is_none() => Ok(()),
            status => Err(GitConfigError::CommandFailed {
                operation,
                key: key.to_string(),
                status,
                stderr: output.stderr.trim().to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl GitConfigWriter for GitCli {
    async fn read(&self, scope: &ConfigScope) -> Result<GitIdentityConfig> {
        self.ensure_repository(scope).await?;
        Ok(GitIdentityConfig {
            name: self.get(scope, super::USER_NAME).await?,
            email: self.get(scope, super::USER_EMAIL).await?,
            signing_key: self.get(scope, super::USER_SIGNING_KEY).await?,
        })
    }

    async fn write(&self, scope: &ConfigScope, config: &GitIdentityConfig) -> Result<()> {
        self.ensure_repository(scope).await?;
        for (key, value) in config.entries() {
            self.set(scope, key, value).await?;
        }
        tracing::debug!(%scope, "Wrote git identity config");
        Ok(())
    }
}
