use crate::{
    Result,
    transaction::{StepContext, StepName, TransactionError, ValidationIssue, ValidationPhase},
};

const STEP: StepName = StepName::Validation;

/// Final isolation check after every other step has applied.
///
/// Fails with an isolation violation if a token or key of another identity
/// is still reachable. Has nothing to roll back.
#[derive(Debug, Default)]
pub struct ValidationStep;

impl ValidationStep {
    pub fn new() -> Self {
        Self
    }

    pub(crate) async fn apply(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        let target = ctx.target;

        if target.requires_token_isolation {
            let active = ctx.token_store.active_alias().await?;
            let has_token = match ctx.token_store.get_token_metadata(&target.alias).await {
                Ok(_) => true,
                Err(e) if e.is_not_found() => false,
                Err(e) => return Err(e),
            };
            let expected = has_token.then(|| target.alias.as_str());
            if active.as_deref() != expected {
                return Err(TransactionError::IsolationViolation {
                    step: STEP,
                    reason: format!(
                        "token of '{}' is reachable while switching to '{}'",
                        active.as_deref().unwrap_or("none"),
                        target.alias
                    ),
                }
                .into());
            }
        }

        if target.requires_ssh_isolation && !ctx.options.skip_ssh_validation {
            ctx.ssh_manager.verify(target).await?;
        }
        Ok(())
    }

    pub(crate) async fn validate(&self, ctx: &StepContext<'_>, phase: ValidationPhase) -> Vec<ValidationIssue> {
        if phase == ValidationPhase::Post {
            return Vec::new();
        }
        let mut issues = Vec::new();
        if let Err(e) = ctx.target.validate() {
            issues.push(ValidationIssue::error(STEP, e.to_string()));
        }
        if ctx.source.is_some_and(|s| s.alias == ctx.target.alias) {
            issues.push(ValidationIssue::warning(
                STEP,
                format!("'{}' is already the current identity", ctx.target.alias),
            ));
        }
        issues
    }

    pub(crate) async fn rollback(&mut self, _ctx: &StepContext<'_>) -> Result<()> {
        Ok(())
    }
}
