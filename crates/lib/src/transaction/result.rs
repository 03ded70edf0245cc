use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{StepName, TransactionError};
use crate::config::duration_secs;

/// Where a switch ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalState {
    /// Every step applied and verified; the caller may record the target as current.
    Switched,
    /// A step failed and every completed step was undone.
    RolledBack,
    /// A step failed and at least one compensating action failed too.
    PartiallyRolledBack,
    /// Nothing was changed (pre-validation failed, or validate-only).
    Unchanged,
    /// A step failed with rollback disabled; completed steps are still in effect.
    UnchangedButPartial,
}

impl FinalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalState::Switched => "switched",
            FinalState::RolledBack => "rolled-back",
            FinalState::PartiallyRolledBack => "partially-rolled-back",
            FinalState::Unchanged => "unchanged",
            FinalState::UnchangedButPartial => "unchanged-but-partial",
        }
    }
}

impl fmt::Display for FinalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Apply,
    Validation,
    Timeout,
    IsolationViolation,
    Rollback,
}

/// A step that failed, and how.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: StepName,
    pub kind: FailureKind,
    pub message: String,
}

impl StepFailure {
    pub(crate) fn from_error(step: StepName, err: &crate::Error) -> Self {
        let kind = if err.is_isolation_violation() {
            FailureKind::IsolationViolation
        } else {
            FailureKind::Apply
        };
        Self {
            step,
            kind,
            message: err.to_string(),
        }
    }

    /// The matching [`TransactionError`].
    pub fn to_error(&self, timeout: Duration) -> TransactionError {
        let step = self.step;
        let reason = self.message.clone();
        match self.kind {
            FailureKind::Apply => TransactionError::StepApplyFailure { step, reason },
            FailureKind::Validation => TransactionError::StepValidationFailure { step, reason },
            FailureKind::Timeout => TransactionError::TimeoutExceeded { step, after: timeout },
            FailureKind::IsolationViolation => TransactionError::IsolationViolation { step, reason },
            FailureKind::Rollback => TransactionError::RollbackFailure { step, reason },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A finding from a pre- or post-condition check, or a warning raised while applying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub step: StepName,
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    pub fn warning(step: StepName, message: impl Into<String>) -> Self {
        Self {
            step,
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(step: StepName, message: impl Into<String>) -> Self {
        Self {
            step,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Immutable report of one switch, returned by `execute` and `validate_only`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionResult {
    pub transaction_id: Uuid,
    pub source: Option<String>,
    pub target: String,
    pub success: bool,
    pub completed_steps: Vec<StepName>,
    pub failed_step: Option<StepFailure>,
    /// Error-severity issues from pre/post validation.
    pub validation_errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    /// Steps whose rollback succeeded, in the order they ran.
    pub rollback_steps: Vec<StepName>,
    pub rollback_failures: Vec<StepFailure>,
    /// Steps whose effects are still in place after a failed switch.
    pub uncompensated_steps: Vec<StepName>,
    pub final_state: FinalState,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// The deadline that applied to this switch.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl TransactionResult {
    /// Completed steps that rollback never touched, in reverse order.
    pub fn rollback_not_attempted(&self) -> Vec<StepName> {
        self.completed_steps
            .iter()
            .rev()
            .copied()
            .filter(|step| {
                !self.rollback_steps.contains(step)
                    && !self.rollback_failures.iter().any(|f| f.step == *step)
            })
            .collect()
    }

    /// `Ok` for a completed switch (or passing validation), otherwise the
    /// error describing why not.
    pub fn into_error(&self) -> Result<(), TransactionError> {
        if self.success {
            return Ok(());
        }
        if let Some(failure) = &self.failed_step {
            return Err(failure.to_error(self.timeout));
        }
        match self.validation_errors.first() {
            Some(issue) => Err(TransactionError::StepValidationFailure {
                step: issue.step,
                reason: issue.message.clone(),
            }),
            None => Ok(()),
        }
    }
}
