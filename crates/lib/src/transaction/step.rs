//! The closed set of switch steps and what they see while running.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    TransactionOptions, ValidationIssue,
    steps::{EnvironmentStep, GitConfigurationStep, SshIsolationStep, TokenIsolationStep, ValidationStep},
};
use crate::{Identity, Result, ssh::SshIsolationManager, token::TokenIsolationStore};

/// Step identifiers, declared in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    TokenIsolation,
    SshIsolation,
    GitConfig,
    Environment,
    Validation,
}

impl StepName {
    pub const ALL: [StepName; 5] = [
        StepName::TokenIsolation,
        StepName::SshIsolation,
        StepName::GitConfig,
        StepName::Environment,
        StepName::Validation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::TokenIsolation => "token_isolation",
            StepName::SshIsolation => "ssh_isolation",
            StepName::GitConfig => "git_config",
            StepName::Environment => "environment",
            StepName::Validation => "validation",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StepName::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("unknown step '{s}'"))
    }
}

/// Which side of the forward pass a check runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationPhase {
    /// Against the current state, before anything changes.
    Pre,
    /// Against the state the step just produced.
    Post,
}

/// Shared, read-only view of the transaction handed to every step call.
pub struct StepContext<'a> {
    pub tx_id: Uuid,
    pub source: Option<&'a Identity>,
    pub target: &'a Identity,
    pub options: &'a TransactionOptions,
    pub token_store: &'a dyn TokenIsolationStore,
    pub ssh_manager: &'a dyn SshIsolationManager,
    pub now: DateTime<Utc>,
}

/// One unit of a switch.
///
/// Every variant is idempotent: applying twice leaves the same state as
/// applying once, and rolling back a step that never captured anything is a
/// no-op.
pub enum SwitchStep {
    TokenIsolation(TokenIsolationStep),
    SshIsolation(SshIsolationStep),
    GitConfiguration(GitConfigurationStep),
    Environment(EnvironmentStep),
    Validation(ValidationStep),
}

impl SwitchStep {
    pub fn name(&self) -> StepName {
        match self {
            SwitchStep::TokenIsolation(_) => StepName::TokenIsolation,
            SwitchStep::SshIsolation(_) => StepName::SshIsolation,
            SwitchStep::GitConfiguration(_) => StepName::GitConfig,
            SwitchStep::Environment(_) => StepName::Environment,
            SwitchStep::Validation(_) => StepName::Validation,
        }
    }

    pub async fn apply(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        match self {
            SwitchStep::TokenIsolation(step) => step.apply(ctx).await,
            SwitchStep::SshIsolation(step) => step.apply(ctx).await,
            SwitchStep::GitConfiguration(step) => step.apply(ctx).await,
            SwitchStep::Environment(step) => step.apply(ctx).await,
            SwitchStep::Validation(step) => step.apply(ctx).await,
        }
    }

    /// Check pre- or post-conditions. Never mutates anything.
    pub async fn validate(&self, ctx: &StepContext<'_>, phase: ValidationPhase) -> Vec<ValidationIssue> {
        match self {
            SwitchStep::TokenIsolation(step) => step.validate(ctx, phase).await,
            SwitchStep::SshIsolation(step) => step.validate(ctx, phase).await,
            SwitchStep::GitConfiguration(step) => step.validate(ctx, phase).await,
            SwitchStep::Environment(step) => step.validate(ctx, phase).await,
            SwitchStep::Validation(step) => step.validate(ctx, phase).await,
        }
    }

    pub async fn rollback(&mut self, ctx: &StepContext<'_>) -> Result<()> {
        match self {
            SwitchStep::TokenIsolation(step) => step.rollback(ctx).await,
            SwitchStep::SshIsolation(step) => step.rollback(ctx).await,
            SwitchStep::GitConfiguration(step) => step.rollback(ctx).await,
            SwitchStep::Environment(step) => step.rollback(ctx).await,
            SwitchStep::Validation(step) => step.rollback(ctx).await,
        }
    }

    /// Non-fatal findings raised during `apply`.
    pub fn take_warnings(&mut self) -> Vec<ValidationIssue> {
        match self {
            SwitchStep::TokenIsolation(step) => std::mem::take(&mut step.warnings),
            _ => Vec::new(),
        }
    }
}

impl From<TokenIsolationStep> for SwitchStep {
    fn from(step: TokenIsolationStep) -> Self {
        SwitchStep::TokenIsolation(step)
    }
}

impl From<SshIsolationStep> for SwitchStep {
    fn from(step: SshIsolationStep) -> Self {
        SwitchStep::SshIsolation(step)
    }
}

impl From<GitConfigurationStep> for SwitchStep {
    fn from(step: GitConfigurationStep) -> Self {
        SwitchStep::GitConfiguration(step)
    }
}

impl From<EnvironmentStep> for SwitchStep {
    fn from(step: EnvironmentStep) -> Self {
        SwitchStep::Environment(step)
    }
}

impl From<ValidationStep> for SwitchStep {
    fn from(step: ValidationStep) -> Self {
        SwitchStep::Validation(step)
    }
}
