//! Transaction specific errors
//!
//! Failures inside a switch are reported through
//! [`TransactionResult`](super::TransactionResult) rather than returned, so
//! the variants here serve two purposes: rejecting a badly built transaction,
//! and giving callers a `?`-friendly error via
//! [`TransactionResult::into_error`](super::TransactionResult::into_error).

use std::time::Duration;

use thiserror::Error;

use super::StepName;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransactionError {
    /// A step's forward action failed
    #[error("Step '{step}' failed: {reason}")]
    StepApplyFailure { step: StepName, reason: String },

    /// A pre- or post-condition check failed
    #[error("Validation of step '{step}' failed: {reason}")]
    StepValidationFailure { step: StepName, reason: String },

    /// A compensating action failed; the system may be partially switched
    #[error("Rollback of step '{step}' failed: {reason}")]
    RollbackFailure { step: StepName, reason: String },

    /// The overall deadline passed while `step` was running
    #[error("Switch timed out after {after:?} during step '{step}'")]
    TimeoutExceeded { step: StepName, after: Duration },

    /// A key or token belonging to another identity is reachable
    #[error("Isolation violation in step '{step}': {reason}")]
    IsolationViolation { step: StepName, reason: String },

    #[error("Step '{step}' cannot run after '{after}'")]
    StepOutOfOrder { step: StepName, after: StepName },

    #[error("Step '{step}' was added twice")]
    DuplicateStep { step: StepName },

    /// Steps depend on each other's side effects and always run in sequence
    #[error("Concurrent step execution is not supported")]
    ConcurrentStepsUnsupported,
}

impl TransactionError {
    /// Check if this error means another identity's key or token leaked.
    pub fn is_isolation_violation(&self) -> bool {
        matches!(self, TransactionError::IsolationViolation { .. })
    }

    /// Check if the overall deadline was exceeded.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransactionError::TimeoutExceeded { .. })
    }

    /// Check if this error is a failed pre/post check or a malformed transaction.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            TransactionError::StepValidationFailure { .. }
                | TransactionError::StepOutOfOrder { .. }
                | TransactionError::DuplicateStep { .. }
                | TransactionError::ConcurrentStepsUnsupported
        )
    }

    /// Check if rollback left the system partially switched.
    pub fn is_rollback_failure(&self) -> bool {
        matches!(self, TransactionError::RollbackFailure { .. })
    }
}

impl From<TransactionError> for crate::Error {
    fn from(err: TransactionError) -> Self {
        crate::Error::Transaction(err)
    }
}
