//! SSH isolation
//!
//! Every identity gets its own ssh-agent socket under the data directory.
//! Isolating an identity means: its key file exists and is readable, its
//! agent is running, and (with `force_identities_only`) that agent holds the
//! identity's key and nothing else. Git is then pointed at that socket by the
//! environment step, so no other identity's key is reachable.

pub mod agent;
pub mod errors;
pub mod fingerprint;
pub mod manager;

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use agent::{MemoryAgent, OpenSshAgent, SshAgent};
pub use errors::SshError;
pub use manager::AgentIsolationManager;

use crate::{Identity, Result, config::duration_secs};

/// Timeouts and policy for SSH isolation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshIsolationConfig {
    /// Key lifetime inside the agent (`ssh-add -t`). `None` keeps keys until removed.
    #[serde(with = "duration_secs::option")]
    pub max_idle_time: Option<Duration>,

    /// Bound on agent socket operations (start, list, remove).
    #[serde(with = "duration_secs")]
    pub socket_timeout: Duration,

    /// Bound on loading a key into the agent.
    #[serde(with = "duration_secs")]
    pub key_load_timeout: Duration,

    /// Remove every other key from the identity's agent before loading.
    pub force_identities_only: bool,
}

impl Default for SshIsolationConfig {
    fn default() -> Self {
        Self {
            max_idle_time: Some(Duration::from_secs(8 * 60 * 60)),
            socket_timeout: Duration::from_secs(5),
            key_load_timeout: Duration::from_secs(10),
            force_identities_only: true,
        }
    }
}

/// Agent state for one identity's socket, captured before a switch touches it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SshSnapshot {
    pub alias: String,
    pub socket: PathBuf,
    pub key_path: Option<PathBuf>,
    /// Whether an agent was answering on `socket`
    pub agent_running: bool,
    /// Fingerprints loaded at snapshot time
    pub fingerprints: Vec<String>,
}

/// Per-identity agent/socket controller.
#[async_trait]
pub trait SshIsolationManager: Send + Sync {
    /// Agent socket dedicated to `identity`.
    fn socket_path(&self, identity: &Identity) -> PathBuf;

    /// Verify the key file exists and is readable. Never touches the agent.
    async fn check_key(&self, identity: &Identity) -> Result<()>;

    /// Record the current agent state for `identity` so it can be restored.
    async fn snapshot(&self, identity: &Identity) -> Result<SshSnapshot>;

    /// Make `identity`'s agent expose its key (and only its key when forced).
    ///
    /// Fails fast on a missing key instead of falling back to any ambient agent.
    async fn isolate(&self, identity: &Identity) -> Result<()>;

    /// Confirm the agent holds exactly what `isolate` promised.
    async fn verify(&self, identity: &Identity) -> Result<()>;

    /// Put the agent back the way `snapshot` found it.
    ///
    /// Keys that cannot be reloaded (anything but the identity's own key)
    /// are reported as [`SshError::RestoreIncomplete`] after the rest is restored.
    async fn restore(&self, snapshot: &SshSnapshot) -> Result<()>;

    /// Stop `identity`'s agent so its key is no longer reachable.
    async fn release(&self, identity: &Identity) -> Result<()>;
}
