//! Agent-socket isolation manager.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;

use super::{SshAgent, SshError, SshIsolationConfig, SshIsolationManager, SshSnapshot, fingerprint};
use crate::{Identity, Result};

/// [`SshIsolationManager`] that gives each identity its own agent socket
/// under `socket_dir`.
pub struct AgentIsolationManager<A: SshAgent> {
    agent: Arc<A>,
    socket_dir: PathBuf,
    config: SshIsolationConfig,
}

impl<A: SshAgent> AgentIsolationManager<A> {
    pub fn new(agent: Arc<A>, socket_dir: impl Into<PathBuf>, config: SshIsolationConfig) -> Self {
        Self {
            agent,
            socket_dir: socket_dir.into(),
            config,
        }
    }

    pub fn config(&self) -> &SshIsolationConfig {
        &self.config
    }

    fn key_path<'a>(&self, identity: &'a Identity) -> Result<&'a Path> {
        identity.ssh_key_path.as_deref().ok_or_else(|| {
            SshError::NoKeyConfigured {
                alias: identity.alias.clone(),
            }
            .into()
        })
    }

    async fn bounded<T, F>(&self, operation: &'static str, after: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(after, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, ?after, "SSH agent operation timed out");
                Err(SshError::Timeout { operation, after }.into())
            }
        }
    }

    async fn load_target(&self, socket: &Path, key: &Path) -> Result<()> {
        let socket_timeout = self.config.socket_timeout;
        self.bounded(
            "start",
            socket_timeout,
            self.agent.ensure_running(socket, self.config.max_idle_time),
        )
        .await?;
        if self.config.force_identities_only {
            self.bounded("remove_all", socket_timeout, self.agent.remove_all(socket))
                .await?;
        }
        self.bounded(
            "add_key",
            self.config.key_load_timeout,
            self.agent.add_key(socket, key, self.config.max_idle_time),
        )
        .await
    }
}

#[async_trait]
impl<A: SshAgent> SshIsolationManager for AgentIsolationManager<A> {
    fn socket_path(&self, identity: &Identity) -> PathBuf {
        self.socket_dir.join(format!("{}.sock", identity.alias))
    }

    async fn check_key(&self, identity: &Identity) -> Result<()> {
        let key = self.key_path(identity)?;
        let metadata = match tokio::fs::metadata(key).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SshError::KeyNotFound {
                    path: key.to_path_buf(),
                }
                .into());
            }
            Err(e) => {
                return Err(SshError::KeyNotReadable {
                    path: key.to_path_buf(),
                    reason: e.to_string(),
                }
                .into());
            }
        };
        if !metadata.is_file() {
            return Err(SshError::KeyNotReadable {
                path: key.to_path_buf(),
                reason: "not a regular file".to_string(),
            }
            .into());
        }
        tokio::fs::File::open(key)
            .await
            .map_err(|e| SshError::KeyNotReadable {
                path: key.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn snapshot(&self, identity: &Identity) -> Result<SshSnapshot> {
        let socket = self.socket_path(identity);
        let socket_timeout = self.config.socket_timeout;
        let agent_running = self
            .bounded("is_running", socket_timeout, self.agent.is_running(&socket))
            .await?;
        let fingerprints = if agent_running {
            self.bounded("list", socket_timeout, self.agent.list_fingerprints(&socket))
                .await?
        } else {
            Vec::new()
        };
        Ok(SshSnapshot {
            alias: identity.alias.clone(),
            socket,
            key_path: identity.ssh_key_path.clone(),
            agent_running,
            fingerprints,
        })
    }

    async fn isolate(&self, identity: &Identity) -> Result<()> {
        self.check_key(identity).await?;
        let key = self.key_path(identity)?;
        // Needed later by verify(); fail now rather than after mutating the agent.
        fingerprint::fingerprint_for_key(key).await?;

        let before = self.snapshot(identity).await?;
        let socket = before.socket.clone();

        if let Err(e) = self.load_target(&socket, key).await {
            tracing::warn!(alias = %identity.alias, error = %e, "Key load failed; restoring agent");
            if let Err(restore_err) = self.restore(&before).await {
                tracing::error!(alias = %identity.alias, error = %restore_err, "Agent restore after failed load also failed");
            }
            return Err(e);
        }

        tracing::info!(alias = %identity.alias, socket = %socket.display(), "SSH key isolated");
        Ok(())
    }

    async fn verify(&self, identity: &Identity) -> Result<()> {
        let key = self.key_path(identity)?;
        let expected = fingerprint::fingerprint_for_key(key).await?;
        let socket = self.socket_path(identity);
        let loaded = self
            .bounded(
                "list",
                self.config.socket_timeout,
                self.agent.list_fingerprints(&socket),
            )
            .await?;

        let isolated = if self.config.force_identities_only {
            loaded.len() == 1 && loaded[0] == expected
        } else {
            loaded.contains(&expected)
        };
        if isolated {
            Ok(())
        } else {
            Err(SshError::IsolationViolation {
                alias: identity.alias.clone(),
                expected,
                found: loaded,
            }
            .into())
        }
    }

    async fn restore(&self, snapshot: &SshSnapshot) -> Result<()> {
        let socket = &snapshot.socket;
        let socket_timeout = self.config.socket_timeout;

        if !snapshot.agent_running {
            return self
                .bounded("stop", socket_timeout, self.agent.stop(socket))
                .await;
        }

        self.bounded(
            "start",
            socket_timeout,
            self.agent.ensure_running(socket, self.config.max_idle_time),
        )
        .await?;
        self.bounded("remove_all", socket_timeout, self.agent.remove_all(socket))
            .await?;

        let own = match &snapshot.key_path {
            Some(key) => fingerprint::fingerprint_for_key(key).await.ok().map(|fp| (key, fp)),
            None => None,
        };
        let mut lost = Vec::new();
        for fp in &snapshot.fingerprints {
            match &own {
                Some((key, own_fp)) if own_fp == fp => {
                    self.bounded(
                        "add_key",
                        self.config.key_load_timeout,
                        self.agent.add_key(socket, key, self.config.max_idle_time),
                    )
                    .await?;
                }
                _ => {
                    tracing::warn!(alias = %snapshot.alias, fingerprint = %fp, "Foreign key in agent cannot be restored");
                    lost.push(fp.clone());
                }
            }
        }
        if !lost.is_empty() {
            return Err(SshError::RestoreIncomplete {
                alias: snapshot.alias.clone(),
                lost,
            }
            .into());
        }
        tracing::debug!(alias = %snapshot.alias, "SSH agent restored");
        Ok(())
    }

    async fn release(&self, identity: &Identity) -> Result<()> {
        let socket = self.socket_path(identity);
        self.bounded("stop", self.config.socket_timeout, self.agent.stop(&socket))
            .await?;
        tracing::info!(alias = %identity.alias, socket = %socket.display(), "SSH agent released");
        Ok(())
    }
}
