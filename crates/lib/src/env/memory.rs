//! In-memory [`EnvironmentConfigurator`] for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{EnvError, EnvVars, EnvironmentConfigurator};
use crate::{Result, testing::FailAfter};

#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    vars: Mutex<Option<EnvVars>>,
    write_faults: FailAfter,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_faults(&self) -> &FailAfter {
        &self.write_faults
    }

    /// Current exports without going through the trait.
    pub fn get(&self) -> Option<EnvVars> {
        self.vars.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EnvironmentConfigurator for MemoryEnvironment {
    async fn read(&self) -> Result<Option<EnvVars>> {
        Ok(self.get())
    }

    async fn write(&self, vars: Option<&EnvVars>) -> Result<()> {
        if self.write_faults.trip() {
            return Err(EnvError::WriteRejected.into());
        }
        *self.vars.lock().unwrap_or_else(|e| e.into_inner()) = vars.cloned();
        Ok(())
    }
}
