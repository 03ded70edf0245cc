//! In-memory [`GitConfigWriter`] for tests.

use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use super::{ConfigScope, GitConfigError, GitConfigWriter, GitIdentityConfig, USER_NAME};
use crate::{Result, testing::FailAfter};

/// Scopes and their identity keys, held in memory.
///
/// `write_faults` makes writes fail. `ignore_writes` makes them report
/// success without changing anything, which is how tests provoke a failed
/// post-switch validation.
#[derive(Debug, Default)]
pub struct MemoryGitConfig {
    scopes: Mutex<BTreeMap<ConfigScope, GitIdentityConfig>>,
    write_faults: FailAfter,
    ignore_writes: AtomicBool,
}

impl MemoryGitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `scope` with `config`.
    pub fn with_scope(self, scope: ConfigScope, config: GitIdentityConfig) -> Self {
        self.lock().insert(scope, config);
        self
    }

    pub fn write_faults(&self) -> &FailAfter {
        &self.write_faults
    }

    pub fn set_ignore_writes(&self, ignore: bool) {
        self.ignore_writes.store(ignore, Ordering::SeqCst);
    }

    /// Current contents of `scope` without going through the trait.
    pub fn get(&self, scope: &ConfigScope) -> GitIdentityConfig {
        self.lock().get(scope).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ConfigScope, GitIdentityConfig>> {
        self.scopes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl GitConfigWriter for MemoryGitConfig {
    async fn read(&self, scope: &ConfigScope) -> Result<GitIdentityConfig> {
        Ok(self.get(scope))
    }

    async fn write(&self, scope: &ConfigScope, config: &GitIdentityConfig) -> Result<()> {
        if self.write_faults.trip() {
            return Err(GitConfigError::WriteRejected {
                key: USER_NAME.to_string(),
            }
            .into());
        }
        if self.ignore_writes.load(Ordering::SeqCst) {
            return Ok(());
        }
        if *config == GitIdentityConfig::default() {
            self.lock().remove(scope);
        } else {
            self.lock().insert(scope.clone(), config.clone());
        }
        Ok(())
    }
}
