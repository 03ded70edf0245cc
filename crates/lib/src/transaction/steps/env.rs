use std::sync::Arc;

use crate::{
    Identity, Result,
    constants::{ACTIVE_ACCOUNT_VAR, GIT_SSH_COMMAND, SSH_AUTH_SOCK},
    env::{EnvVars, EnvironmentConfigurator, shell_quote},
    ssh::SshIsolationManager,
    transaction::{StepContext, StepName, ValidationIssue, ValidationPhase},
};

const STEP: StepName = StepName::Environment;

/// Exports the variables that make Git use the isolated key.
pub struct EnvironmentStep {
    configurator: Arc<dyn EnvironmentConfigurator>,
    /// Exports before `apply`; `Some(None)` means there were none.
    previous: Option<Option<EnvVars>>,
}

impl EnvironmentStep {
    pub fn new(configurator: Arc<dyn EnvironmentConfigurator>) -> Self {
        Self {
            configurator,
            previous: None,
        }
    }

    pub(crate) async fn apply(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        self.previous = Some(self.configurator.read().await?);
        let vars = exports_for(ctx.target, ctx.ssh_manager);
        self.configurator.write(Some(&vars)).await
    }

    pub(crate) async fn validate(&self, ctx: &StepContext<'_>, phase: ValidationPhase) -> Vec<ValidationIssue> {
        let current = match self.configurator.read().await {
            Ok(current) => current,
            Err(e) => return vec![ValidationIssue::error(STEP, e.to_string())],
        };
        if phase == ValidationPhase::Pre {
            return Vec::new();
        }
        let expected = exports_for(ctx.target, ctx.ssh_manager);
        if current.as_ref() == Some(&expected) {
            Vec::new()
        } else {
            vec![ValidationIssue::error(
                STEP,
                format!("environment exports do not select '{}'", ctx.target.alias),
            )]
        }
    }

    pub(crate) async fn rollback(&mut self, _ctx: &StepContext<'_>) -> Result<()> {
        match &self.previous {
            Some(previous) => self.configurator.write(previous.as_ref()).await,
            None => Ok(()),
        }
    }
}

/// Variables exported for `identity`.
///
/// Without SSH isolation only the account marker is exported, which also
/// clears any `GIT_SSH_COMMAND` left by the previous identity.
pub fn exports_for(identity: &Identity, ssh: &dyn SshIsolationManager) -> EnvVars {
    let mut vars = EnvVars::new();
    vars.insert(ACTIVE_ACCOUNT_VAR.to_string(), identity.alias.clone());
    let key = identity
        .ssh_key_path
        .as_ref()
        .filter(|_| identity.requires_ssh_isolation);
    if let Some(key) = key {
        vars.insert(
            GIT_SSH_COMMAND.to_string(),
            format!(
                "ssh -i {} -o IdentitiesOnly=yes",
                shell_quote(&key.display().to_string())
            ),
        );
        vars.insert(
            SSH_AUTH_SOCK.to_string(),
            ssh.socket_path(identity).display().to_string(),
        );
    }
    vars
}
