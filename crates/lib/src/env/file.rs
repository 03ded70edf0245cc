//! [`EnvironmentConfigurator`] backed by a sourceable shell file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{EnvError, EnvVars, EnvironmentConfigurator, parse_exports, render_exports};
use crate::{
    Result,
    persist::{self, Visibility},
};

/// Writes `export` lines to a file such as `~/.local/share/gitswitch/env.sh`.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> crate::Error {
        EnvError::Io {
            path: self.path.clone(),
            source,
        }
        .into()
    }
}

#[async_trait]
impl EnvironmentConfigurator for EnvFile {
    async fn read(&self) -> Result<Option<EnvVars>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        parse_exports(&contents).map(Some).map_err(|line| {
            EnvError::Malformed {
                path: self.path.clone(),
                line,
            }
            .into()
        })
    }

    async fn write(&self, vars: Option<&EnvVars>) -> Result<()> {
        let Some(vars) = vars else {
            persist::remove_if_exists(&self.path).await?;
            tracing::debug!(path = %self.path.display(), "Removed environment file");
            return Ok(());
        };
        let rendered = render_exports(vars)?;
        persist::write_atomic(&self.path, rendered.into_bytes(), Visibility::Normal)
            .await
            .map_err(|e| match e {
                crate::Error::Io(source) => self.io_error(source),
                other => other,
            })?;
        tracing::debug!(path = %self.path.display(), count = vars.len(), "Wrote environment file");
        Ok(())
    }
}
