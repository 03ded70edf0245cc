use crate::{
    Result,
    transaction::{StepContext, StepName, ValidationIssue, ValidationPhase},
};

const STEP: StepName = StepName::TokenIsolation;

/// Makes the target's token the only reachable one.
///
/// An identity without a token is switched with a warning and no active
/// token, so the previous identity's token cannot leak into it.
#[derive(Debug, Default)]
pub struct TokenIsolationStep {
    /// Active alias before `apply`; `None` until captured.
    previous: Option<Option<String>>,
    /// What `apply` made active.
    activated: Option<Option<String>>,
    pub(crate) warnings: Vec<ValidationIssue>,
}

impl TokenIsolationStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn apply(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        let store = ctx.token_store;
        let target = ctx.target;
        self.previous = Some(store.active_alias().await?);

        match store.get_token_metadata(&target.alias).await {
            Err(e) if e.is_not_found() => {
                tracing::warn!(alias = %target.alias, "No token configured; identity is SSH-only");
                self.warnings.push(ValidationIssue::warning(
                    STEP,
                    format!("no token configured for '{}'; usable over SSH only", target.alias),
                ));
                store.set_active(None).await?;
                self.activated = Some(None);
            }
            Err(e) => return Err(e),
            Ok(_) => {
                if !ctx.options.skip_token_validation {
                    store
                        .validate_token_isolation(&target.alias, &target.username)
                        .await?;
                }
                store.set_active(Some(target.alias.as_str())).await?;
                self.activated = Some(Some(target.alias.clone()));
            }
        }
        Ok(())
    }

    pub(crate) async fn validate(&self, ctx: &StepContext<'_>, phase: ValidationPhase) -> Vec<ValidationIssue> {
        let store = ctx.token_store;
        let target = ctx.target;
        match phase {
            ValidationPhase::Pre => {
                if ctx.options.skip_token_validation {
                    return Vec::new();
                }
                let metadata = match store.get_token_metadata(&target.alias).await {
                    Ok(metadata) => metadata,
                    Err(e) if e.is_not_found() => {
                        return vec![ValidationIssue::warning(STEP, e.to_string())];
                    }
                    Err(e) => return vec![ValidationIssue::error(STEP, e.to_string())],
                };
                let mut issues = Vec::new();
                if let Err(e) = metadata.check_usable(&target.alias, ctx.now) {
                    issues.push(ValidationIssue::error(STEP, e.to_string()));
                }
                if !metadata.belongs_to(&target.username) {
                    issues.push(ValidationIssue::error(
                        STEP,
                        format!(
                            "token for '{}' belongs to '{}', expected '{}'",
                            target.alias, metadata.username, target.username
                        ),
                    ));
                }
                issues
            }
            ValidationPhase::Post => {
                let Some(expected) = &self.activated else {
                    return Vec::new();
                };
                match store.active_alias().await {
                    Ok(active) if active == *expected => Vec::new(),
                    Ok(active) => vec![ValidationIssue::error(
                        STEP,
                        format!(
                            "active token is {}, expected {}",
                            describe(active.as_deref()),
                            describe(expected.as_deref())
                        ),
                    )],
                    Err(e) => vec![ValidationIssue::error(STEP, e.to_string())],
                }
            }
        }
    }

    pub(crate) async fn rollback(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        if let Some(previous) = &self.previous {
            ctx.token_store.set_active(previous.as_deref()).await?;
        }
        Ok(())
    }
}

fn describe(alias: Option<&str>) -> String {
    alias.map_or_else(|| "none".to_string(), |a| format!("'{a}'"))
}
