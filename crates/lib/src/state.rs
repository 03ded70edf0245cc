//! Current-identity pointer and the switch lock
//!
//! `state.json` records which identity is active. Only the switcher writes
//! it, and only after a transaction ends in `switched`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    Result,
    persist::{self, Visibility},
};

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Another switch is in progress (lock file {})", path.display())]
    Locked { path: PathBuf },

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl StateError {
    /// Check if this error came from the filesystem.
    pub fn is_io_error(&self) -> bool {
        matches!(self, StateError::Io { .. })
    }

    /// Check if a concurrent switch holds the lock.
    pub fn is_locked(&self) -> bool {
        matches!(self, StateError::Locked { .. })
    }
}

impl From<StateError> for crate::Error {
    fn from(err: StateError) -> Self {
        crate::Error::State(err)
    }
}

/// The last completed switch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwitchRecord {
    pub transaction_id: Uuid,
    pub at: DateTime<Utc>,
    pub from: Option<String>,
    pub to: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct State {
    /// Alias of the active identity
    pub current: Option<String>,
    #[serde(default)]
    pub last_switch: Option<SwitchRecord>,
}

/// `state.json` on disk.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state; a missing file is an empty state.
    pub async fn load(&self) -> Result<State> {
        match persist::read_json::<State>(&self.path).await {
            Ok(state) => Ok(state.unwrap_or_default()),
            Err(crate::Error::Serialize(e)) => Err(StateError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }
            .into()),
            Err(crate::Error::Io(source)) => Err(StateError::Io {
                path: self.path.clone(),
                source,
            }
            .into()),
            Err(e) => Err(e),
        }
    }

    pub async fn save(&self, state: &State) -> Result<()> {
        persist::write_json(&self.path, state, Visibility::Normal)
            .await
            .map_err(|e| match e {
                crate::Error::Io(source) => StateError::Io {
                    path: self.path.clone(),
                    source,
                }
                .into(),
                other => other,
            })
    }

    /// Point at `record.to` and remember how we got there.
    pub async fn record_switch(&self, record: SwitchRecord) -> Result<State> {
        let state = State {
            current: Some(record.to.clone()),
            last_switch: Some(record),
        };
        self.save(&state).await?;
        Ok(state)
    }

    /// Forget the current identity, e.g. after it was removed.
    pub async fn clear_current(&self) -> Result<()> {
        let mut state = self.load().await?;
        state.current = None;
        self.save(&state).await
    }
}

/// Exclusive lock file held for the duration of a switch. Removed on drop.
#[derive(Debug)]
pub struct SwitchLock {
    path: PathBuf,
}

impl SwitchLock {
    /// Create `path` exclusively; fails with [`StateError::Locked`] if it exists.
    pub async fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match opened {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                file.write_all(std::process::id().to_string().as_bytes())
                    .await?;
                tracing::debug!(path = %path.display(), "Acquired switch lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StateError::Locked { path }.into())
            }
            Err(source) => Err(StateError::Io { path, source }.into()),
        }
    }
}

impl Drop for SwitchLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release switch lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_state_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));
        assert_eq!(file.load().await.unwrap(), State::default());
    }

    #[tokio::test]
    async fn record_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));
        let record = SwitchRecord {
            transaction_id: Uuid::new_v4(),
            at: Utc::now(),
            from: None,
            to: "work".into(),
        };
        file.record_switch(record.clone()).await.unwrap();

        let state = file.load().await.unwrap();
        assert_eq!(state.current.as_deref(), Some("work"));
        assert_eq!(state.last_switch, Some(record));

        file.clear_current().await.unwrap();
        let state = file.load().await.unwrap();
        assert_eq!(state.current, None);
        assert!(state.last_switch.is_some());
    }

    #[tokio::test]
    async fn corrupt_state_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "][").unwrap();
        let err = StateFile::new(&path).load().await.unwrap_err();
        assert!(matches!(err, crate::Error::State(StateError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switch.lock");

        let lock = SwitchLock::acquire(&path).await.unwrap();
        let err = SwitchLock::acquire(&path).await.unwrap_err();
        assert!(matches!(&err, crate::Error::State(e) if e.is_locked()));

        drop(lock);
        assert!(!path.exists());
        SwitchLock::acquire(&path).await.unwrap();
    }
}
