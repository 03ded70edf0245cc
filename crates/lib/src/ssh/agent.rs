//! ssh-agent backends.
//!
//! [`OpenSshAgent`] drives the real `ssh-agent`/`ssh-add` binaries against a
//! per-identity socket. [`MemoryAgent`] models the same contract in memory
//! for tests, with fault and latency injection.

use std::{
    collections::BTreeMap,
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use super::{SshError, fingerprint};
use crate::{Result, constants::SSH_AUTH_SOCK, persist, process, testing::FailAfter};

/// Operations the isolation manager needs from an agent bound to one socket.
#[async_trait]
pub trait SshAgent: Send + Sync {
    /// Whether an agent answers on `socket`.
    async fn is_running(&self, socket: &Path) -> Result<bool>;

    /// Start an agent on `socket` if none answers. Returns `true` if one was started.
    async fn ensure_running(&self, socket: &Path, key_lifetime: Option<Duration>) -> Result<bool>;

    /// Stop the agent on `socket` if it is ours to stop.
    async fn stop(&self, socket: &Path) -> Result<()>;

    /// SHA-256 fingerprints of loaded keys.
    async fn list_fingerprints(&self, socket: &Path) -> Result<Vec<String>>;

    /// Load `key` into the agent.
    async fn add_key(&self, socket: &Path, key: &Path, lifetime: Option<Duration>) -> Result<()>;

    /// Remove every key from the agent.
    async fn remove_all(&self, socket: &Path) -> Result<()>;
}

/// Agent backed by the OpenSSH tools.
///
/// Each call is bounded by `command_timeout`; the manager layers its own
/// per-operation timeouts on top.
#[derive(Debug, Clone)]
pub struct OpenSshAgent {
    command_timeout: Duration,
}

impl OpenSshAgent {
    pub fn new(command_timeout: Duration) -> Self {
        Self { command_timeout }
    }

    fn pid_file(socket: &Path) -> PathBuf {
        let mut name = socket.as_os_str().to_owned();
        name.push(".pid");
        PathBuf::from(name)
    }

    async fn ssh_add<I, S>(&self, socket: &Path, args: I) -> Result<process::CommandOutput>
    where
        I: IntoIterator<Item = S> + Send,
        S: AsRef<OsStr>,
    {
        let envs = [(SSH_AUTH_SOCK, socket.as_os_str())];
        process::run("ssh-add", args, &envs, self.command_timeout)
            .await
            .map_err(|e| SshError::from(e).into())
    }
}

/// `ssh-agent` prints `SSH_AGENT_PID=1234; export SSH_AGENT_PID;`
fn parse_agent_pid(output: &str) -> Option<u32> {
    output
        .split(';')
        .find_map(|part| part.trim().strip_prefix("SSH_AGENT_PID="))
        .and_then(|pid| pid.trim().parse().ok())
}

#[async_trait]
impl SshAgent for OpenSshAgent {
    async fn is_running(&self, socket: &Path) -> Result<bool> {
        if tokio::fs::metadata(socket).await.is_err() {
            return Ok(false);
        }
        // ssh-add -l: 0 = keys listed, 1 = agent has no identities, 2 = cannot connect
        let output = self.ssh_add(socket, ["-l"]).await?;
        Ok(matches!(output.status, Some(0) | Some(1)))
    }

    async fn ensure_running(&self, socket: &Path, key_lifetime: Option<Duration>) -> Result<bool> {
        if self.is_running(socket).await? {
            return Ok(false);
        }
        if let Some(dir) = socket.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        // A stale socket file blocks ssh-agent from binding.
        persist::remove_if_exists(socket).await?;

        let mut args = vec!["-s".to_string(), "-a".to_string(), socket.display().to_string()];
        if let Some(lifetime) = key_lifetime {
            args.push("-t".to_string());
            args.push(lifetime.as_secs().max(1).to_string());
        }
        let output = process::run("ssh-agent", &args, &[], self.command_timeout)
            .await
            .map_err(SshError::from)?;
        if !output.success() {
            return Err(SshError::AgentCommand {
                operation: "start",
                reason: output.stderr.trim().to_string(),
            }
            .into());
        }
        if let Some(pid) = parse_agent_pid(&output.stdout) {
            tokio::fs::write(Self::pid_file(socket), pid.to_string()).await?;
        }
        tracing::info!(socket = %socket.display(), "Started ssh-agent");
        Ok(true)
    }

    async fn stop(&self, socket: &Path) -> Result<()> {
        let pid_file = Self::pid_file(socket);
        let pid = match tokio::fs::read_to_string(&pid_file).await {
            Ok(pid) => pid.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let envs = [
            ("SSH_AGENT_PID", OsStr::new(pid.as_str())),
            (SSH_AUTH_SOCK, socket.as_os_str()),
        ];
        let output = process::run("ssh-agent", ["-k"], &envs, self.command_timeout)
            .await
            .map_err(SshError::from)?;
        if !output.success() {
            tracing::warn!(pid = %pid, stderr = %output.stderr.trim(), "ssh-agent -k failed");
        }
        persist::remove_if_exists(&pid_file).await?;
        persist::remove_if_exists(socket).await?;
        Ok(())
    }

    async fn list_fingerprints(&self, socket: &Path) -> Result<Vec<String>> {
        let output = self.ssh_add(socket, ["-l", "-E", "sha256"]).await?;
        match output.status {
            Some(0) => Ok(fingerprint::parse_agent_listing(&output.stdout)),
            Some(1) => Ok(Vec::new()),
            _ => Err(SshError::AgentUnavailable {
                socket: socket.to_path_buf(),
            }
            .into()),
        }
    }

    async fn add_key(&self, socket: &Path, key: &Path, lifetime: Option<Duration>) -> Result<()> {
        let mut args = Vec::new();
        if let Some(lifetime) = lifetime {
            args.push("-t".to_string());
            args.push(lifetime.as_secs().max(1).to_string());
        }
        args.push(key.display().to_string());
        let output = self.ssh_add(socket, &args).await?;
        if output.success() {
            Ok(())
        } else {
            Err(SshError::KeyLoadFailed {
                path: key.to_path_buf(),
                reason: output.stderr.trim().to_string(),
            }
            .into())
        }
    }

    async fn remove_all(&self, socket: &Path) -> Result<()> {
        let output = self.ssh_add(socket, ["-D"]).await?;
        if output.success() {
            Ok(())
        } else {
            Err(SshError::AgentCommand {
                operation: "remove_all",
                reason: output.stderr.trim().to_string(),
            }
            .into())
        }
    }
}

/// In-memory agent for tests.
///
/// Keys are tracked per socket by the fingerprint of their `.pub` file.
/// `add_faults` fails `add_key` calls; `add_delay` makes them slow so
/// timeouts can be exercised.
#[derive(Debug, Default)]
pub struct MemoryAgent {
    sockets: Mutex<BTreeMap<PathBuf, Vec<String>>>,
    add_faults: FailAfter,
    add_delay: Mutex<Option<Duration>>,
}

impl MemoryAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault injection for `add_key`.
    pub fn add_faults(&self) -> &FailAfter {
        &self.add_faults
    }

    /// Make every `add_key` sleep for `delay` first.
    pub fn set_add_delay(&self, delay: Option<Duration>) {
        *self.add_delay.lock().unwrap_or_else(|e| e.into_inner()) = delay;
    }

    /// Load an arbitrary fingerprint, e.g. to simulate a foreign key.
    pub fn inject_fingerprint(&self, socket: &Path, fingerprint: impl Into<String>) {
        self.lock()
            .entry(socket.to_path_buf())
            .or_default()
            .push(fingerprint.into());
    }

    /// Every running socket and its loaded fingerprints.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<String>> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<String>>> {
        self.sockets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn unavailable(socket: &Path) -> crate::Error {
        SshError::AgentUnavailable {
            socket: socket.to_path_buf(),
        }
        .into()
    }
}

#[async_trait]
impl SshAgent for MemoryAgent {
    async fn is_running(&self, socket: &Path) -> Result<bool> {
        Ok(self.lock().contains_key(socket))
    }

    async fn ensure_running(&self, socket: &Path, _key_lifetime: Option<Duration>) -> Result<bool> {
        let mut sockets = self.lock();
        if sockets.contains_key(socket) {
            return Ok(false);
        }
        sockets.insert(socket.to_path_buf(), Vec::new());
        Ok(true)
    }

    async fn stop(&self, socket: &Path) -> Result<()> {
        self.lock().remove(socket);
        Ok(())
    }

    async fn list_fingerprints(&self, socket: &Path) -> Result<Vec<String>> {
        self.lock()
            .get(socket)
            .cloned()
            .ok_or_else(|| Self::unavailable(socket))
    }

    async fn add_key(&self, socket: &Path, key: &Path, _lifetime: Option<Duration>) -> Result<()> {
        let delay = *self.add_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.add_faults.trip() {
            return Err(SshError::KeyLoadFailed {
                path: key.to_path_buf(),
                reason: "injected fault".to_string(),
            }
            .into());
        }
        let fp = fingerprint::fingerprint_for_key(key).await?;
        let mut sockets = self.lock();
        let keys = sockets
            .get_mut(socket)
            .ok_or_else(|| Self::unavailable(socket))?;
        if !keys.contains(&fp) {
            keys.push(fp);
        }
        Ok(())
    }

    async fn remove_all(&self, socket: &Path) -> Result<()> {
        self.lock()
            .get_mut(socket)
            .ok_or_else(|| Self::unavailable(socket))?
            .clear();
        Ok(())
    }
}
