//! Bounded execution of external tools (`git`, `ssh-add`, `ssh-agent`).
//!
//! Every invocation carries its own timeout. A child that outlives it is
//! killed, so no OS call can stall a switch indefinitely.

use std::{ffi::OsStr, process::Stdio, time::Duration};

use thiserror::Error;
use tokio::process::Command;

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Failures to run a process at all. Non-zero exits are reported through
/// [`CommandOutput`] so callers can interpret tool-specific codes.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {after:?}")]
    Timeout { program: String, after: Duration },
}

impl ProcessError {
    /// Check if the process was killed for exceeding its timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessError::Timeout { .. })
    }
}

/// Run `program` with `args`, extra `envs`, and a hard `timeout`.
///
/// Stdin is closed so tools that would prompt (e.g. for a key passphrase)
/// fail instead of blocking.
pub async fn run<I, S>(
    program: &str,
    args: I,
    envs: &[(&str, &OsStr)],
    timeout: Duration,
) -> Result<CommandOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in envs {
        command.env(key, value);
    }

    let child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.to_string(),
        source,
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(source)) => Err(ProcessError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(_) => {
            tracing::warn!(program, ?timeout, "External command timed out");
            Err(ProcessError::Timeout {
                program: program.to_string(),
                after: timeout,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = run(
            "gitswitch-definitely-not-a-real-binary",
            ["--version"],
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
        assert!(!err.is_timeout());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_exit_status_and_output() {
        let output = run("sh", ["-c", "echo hi; exit 3"], &[], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout.trim(), "hi");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let err = run("sleep", ["5"], &[], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
