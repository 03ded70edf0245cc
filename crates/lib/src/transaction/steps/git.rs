use std::sync::Arc;

use crate::{
    Result,
    git::{ConfigScope, GitConfigWriter, GitIdentityConfig},
    transaction::{StepContext, StepName, ValidationIssue, ValidationPhase},
};

const STEP: StepName = StepName::GitConfig;

/// Writes the target's name, email and signing key to one Git config scope.
pub struct GitConfigurationStep {
    writer: Arc<dyn GitConfigWriter>,
    scope: ConfigScope,
    previous: Option<GitIdentityConfig>,
}

impl GitConfigurationStep {
    pub fn new(writer: Arc<dyn GitConfigWriter>, scope: ConfigScope) -> Self {
        Self {
            writer,
            scope,
            previous: None,
        }
    }

    pub fn scope(&self) -> &ConfigScope {
        &self.scope
    }

    pub(crate) async fn apply(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        let previous = self.writer.read(&self.scope).await?;
        let desired = GitIdentityConfig::for_identity(ctx.target);
        self.previous = Some(previous.clone());
        if previous == desired {
            tracing::debug!(scope = %self.scope, "Git identity already in place");
            return Ok(());
        }

        if let Err(e) = self.writer.write(&self.scope, &desired).await {
            // A failed write may have set some keys; put them back before reporting.
            if let Err(restore_err) = self.writer.write(&self.scope, &previous).await {
                tracing::error!(scope = %self.scope, error = %restore_err, "Failed to restore git config after failed write");
            }
            return Err(e);
        }
        Ok(())
    }

    pub(crate) async fn validate(&self, ctx: &StepContext<'_>, phase: ValidationPhase) -> Vec<ValidationIssue> {
        let current = match self.writer.read(&self.scope).await {
            Ok(current) => current,
            Err(e) => return vec![ValidationIssue::error(STEP, e.to_string())],
        };
        if phase == ValidationPhase::Pre {
            return Vec::new();
        }
        let desired = GitIdentityConfig::for_identity(ctx.target);
        if current == desired {
            Vec::new()
        } else {
            vec![ValidationIssue::error(
                STEP,
                format!(
                    "{} git config shows {} <{}>, expected {} <{}>",
                    self.scope,
                    current.name.as_deref().unwrap_or("(unset)"),
                    current.email.as_deref().unwrap_or("(unset)"),
                    ctx.target.name,
                    ctx.target.email,
                ),
            )]
        }
    }

    pub(crate) async fn rollback(&mut self, _ctx: &StepContext<'_>) -> Result<()> {
        match &self.previous {
            Some(previous) => self.writer.write(&self.scope, previous).await,
            None => Ok(()),
        }
    }
}
