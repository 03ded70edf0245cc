use crate::{
    Identity, Result,
    ssh::{SshIsolationManager, SshSnapshot},
    transaction::{StepContext, StepName, ValidationIssue, ValidationPhase},
};

const STEP: StepName = StepName::SshIsolation;

/// Loads the target's key, and only that key, into its agent, then stops the
/// source identity's agent.
#[derive(Debug, Default)]
pub struct SshIsolationStep {
    snapshot: Option<SshSnapshot>,
    isolated: bool,
    source_snapshot: Option<SshSnapshot>,
    /// Set before `release` runs so a deadline cut still restores the source.
    source_released: bool,
}

impl SshIsolationStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity whose agent must stop once the target is isolated.
    fn releasable<'a>(ctx: &StepContext<'a>) -> Option<&'a Identity> {
        ctx.source.filter(|source| {
            source.requires_ssh_isolation
                && ctx.ssh_manager.socket_path(source) != ctx.ssh_manager.socket_path(ctx.target)
        })
    }

    pub(crate) async fn apply(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        if ctx.target.requires_ssh_isolation {
            // Captured first so rollback works even if the deadline cuts isolate() short.
            self.snapshot = Some(ctx.ssh_manager.snapshot(ctx.target).await?);
            ctx.ssh_manager.isolate(ctx.target).await?;
            self.isolated = true;
        } else {
            tracing::debug!(alias = %ctx.target.alias, "SSH isolation not required");
        }

        let Some(source) = Self::releasable(ctx) else {
            return Ok(());
        };
        let source_snapshot = match ctx.ssh_manager.snapshot(source).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.undo_target(ctx.ssh_manager).await;
                return Err(e);
            }
        };
        let running = source_snapshot.agent_running;
        self.source_snapshot = Some(source_snapshot);
        if !running {
            return Ok(());
        }
        self.source_released = true;
        if let Err(e) = ctx.ssh_manager.release(source).await {
            tracing::warn!(alias = %source.alias, error = %e, "Failed to stop source agent; restoring");
            if let Err(restore_err) = self.restore_all(ctx.ssh_manager).await {
                tracing::error!(error = %restore_err, "SSH restore after failed release also failed");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn undo_target(&mut self, ssh: &dyn SshIsolationManager) {
        if let Some(snapshot) = self.snapshot.take()
            && let Err(e) = ssh.restore(&snapshot).await
        {
            tracing::error!(alias = %snapshot.alias, error = %e, "Failed to restore target agent");
        }
        self.isolated = false;
    }

    /// Restore the source agent (if it was stopped) and the target agent.
    /// Both are attempted; the first error is returned.
    async fn restore_all(&mut self, ssh: &dyn SshIsolationManager) -> Result<()> {
        let mut first_err = None;
        if self.source_released
            && let Some(snapshot) = &self.source_snapshot
            && let Err(e) = ssh.restore(snapshot).await
        {
            first_err = Some(e);
        }
        if let Some(snapshot) = &self.snapshot
            && let Err(e) = ssh.restore(snapshot).await
        {
            first_err.get_or_insert(e);
        }
        self.source_released = false;
        self.isolated = false;
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) async fn validate(&self, ctx: &StepContext<'_>, phase: ValidationPhase) -> Vec<ValidationIssue> {
        if ctx.options.skip_ssh_validation || !ctx.target.requires_ssh_isolation {
            return Vec::new();
        }
        let outcome = match phase {
            ValidationPhase::Pre => ctx.ssh_manager.check_key(ctx.target).await,
            ValidationPhase::Post if self.isolated => ctx.ssh_manager.verify(ctx.target).await,
            ValidationPhase::Post => Ok(()),
        };
        match outcome {
            Ok(()) => Vec::new(),
            Err(e) => vec![ValidationIssue::error(STEP, e.to_string())],
        }
    }

    pub(crate) async fn rollback(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        self.restore_all(ctx.ssh_manager).await
    }
}
