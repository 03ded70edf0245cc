//! Account switch transactions
//!
//! A [`Transaction`] moves the machine from one identity to another through a
//! fixed sequence of steps: token isolation, SSH isolation, Git configuration,
//! environment, and a final isolation check. Callers may omit steps but never
//! reorder them, since later steps rely on the effects of earlier ones.
//!
//! # Execution
//!
//! 1. With `validate_before_switch`, every step checks its preconditions.
//!    An error (or a warning under `strict_validation`) stops the switch
//!    before anything is touched.
//! 2. Steps apply in order under a single deadline. The first failure, or
//!    the deadline passing, ends the forward pass.
//! 3. With `validate_after_switch`, every completed step re-checks the state
//!    it produced. A failed check is a failed switch.
//! 4. On failure, completed steps roll back in reverse. Rollback is
//!    best-effort: a failing compensation is recorded and the loop moves on.
//!
//! The outcome is always a [`TransactionResult`]; nothing about a failed
//! switch is left unreported. Persisting the new current identity is the
//! caller's job, and only after [`FinalState::Switched`].

pub mod errors;
mod options;
mod result;
mod step;
pub mod steps;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

pub use errors::TransactionError;
pub use options::TransactionOptions;
pub use result::{FailureKind, FinalState, Severity, StepFailure, TransactionResult, ValidationIssue};
pub use step::{StepContext, StepName, SwitchStep, ValidationPhase};
pub use steps::{EnvironmentStep, GitConfigurationStep, SshIsolationStep, TokenIsolationStep, ValidationStep};

use crate::{
    Identity, Result,
    clock::{Clock, SystemClock},
    ssh::SshIsolationManager,
    token::TokenIsolationStore,
};

/// Mutable bookkeeping of one run.
#[derive(Debug)]
struct ExecutionState {
    completed_steps: Vec<StepName>,
    failed_step: Option<StepFailure>,
    rollback_steps: Vec<StepName>,
    rollback_failures: Vec<StepFailure>,
    uncompensated_steps: Vec<StepName>,
    validation_errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    final_state: FinalState,
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self {
            completed_steps: Vec::new(),
            failed_step: None,
            rollback_steps: Vec::new(),
            rollback_failures: Vec::new(),
            uncompensated_steps: Vec::new(),
            validation_errors: Vec::new(),
            warnings: Vec::new(),
            final_state: FinalState::Unchanged,
        }
    }
}

impl ExecutionState {
    fn record_issues(&mut self, issues: Vec<ValidationIssue>) {
        for issue in issues {
            if issue.is_error() {
                self.validation_errors.push(issue);
            } else {
                self.warnings.push(issue);
            }
        }
    }

    /// First issue that must stop the switch.
    fn blocking_issue(&self, strict: bool) -> Option<&ValidationIssue> {
        self.validation_errors
            .first()
            .or_else(|| self.warnings.first().filter(|_| strict))
    }

    fn fail_validation(&mut self, strict: bool) -> bool {
        let Some(issue) = self.blocking_issue(strict) else {
            return false;
        };
        self.failed_step = Some(StepFailure {
            step: issue.step,
            kind: FailureKind::Validation,
            message: issue.message.clone(),
        });
        true
    }

    /// Roll back `steps` (the completed prefix) in reverse. Never stops early.
    async fn rollback(&mut self, steps: &mut [SwitchStep], ctx: &StepContext<'_>) {
        tracing::info!(phase = "rollback-start", count = steps.len(), "Rolling back completed steps");
        for step in steps.iter_mut().rev() {
            let name = step.name();
            match step.rollback(ctx).await {
                Ok(()) => {
                    tracing::info!(phase = "rollback-step", step = %name, "Rolled back");
                    self.rollback_steps.push(name);
                }
                Err(e) => {
                    tracing::error!(phase = "rollback-step", step = %name, error = %e, "Rollback failed");
                    self.rollback_failures.push(StepFailure {
                        step: name,
                        kind: FailureKind::Rollback,
                        message: e.to_string(),
                    });
                    self.uncompensated_steps.push(name);
                }
            }
        }
    }
}

/// One switch from `source` to `target`.
///
/// Owned by a single caller and consumed by [`execute`](Self::execute) or
/// [`validate_only`](Self::validate_only).
pub struct Transaction {
    id: Uuid,
    source: Option<Identity>,
    target: Identity,
    steps: Vec<SwitchStep>,
    options: TransactionOptions,
    token_store: Arc<dyn TokenIsolationStore>,
    ssh_manager: Arc<dyn SshIsolationManager>,
    clock: Arc<dyn Clock>,
    state: ExecutionState,
}

impl Transaction {
    /// Create an empty transaction. Rejects `concurrent_steps`.
    pub fn new(
        source: Option<Identity>,
        target: Identity,
        token_store: Arc<dyn TokenIsolationStore>,
        ssh_manager: Arc<dyn SshIsolationManager>,
        options: TransactionOptions,
    ) -> Result<Self> {
        if options.concurrent_steps {
            return Err(TransactionError::ConcurrentStepsUnsupported.into());
        }
        Ok(Self {
            id: Uuid::new_v4(),
            source,
            target,
            steps: Vec::new(),
            options,
            token_store,
            ssh_manager,
            clock: Arc::new(SystemClock),
            state: ExecutionState::default(),
        })
    }

    /// Use `clock` for token expiry checks and timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    pub fn step_names(&self) -> Vec<StepName> {
        self.steps.iter().map(SwitchStep::name).collect()
    }

    /// Append a step. Steps must be added in execution order, at most once each.
    pub fn add_step(&mut self, step: impl Into<SwitchStep>) -> Result<&mut Self> {
        let step = step.into();
        let name = step.name();
        if let Some(last) = self.steps.last().map(SwitchStep::name) {
            if last == name || self.steps.iter().any(|s| s.name() == name) {
                return Err(TransactionError::DuplicateStep { step: name }.into());
            }
            if last > name {
                return Err(TransactionError::StepOutOfOrder { step: name, after: last }.into());
            }
        }
        self.steps.push(step);
        Ok(self)
    }

    /// Run the switch. Always returns a report; failures are described in it.
    pub async fn execute(mut self) -> TransactionResult {
        let span = tracing::info_span!("switch", tx_id = %self.id, target = %self.target.alias);
        async move {
            let started_at = self.clock.now();
            let started = Instant::now();
            self.run().await;
            let success = self.state.final_state == FinalState::Switched;
            self.into_result(success, started_at, started)
        }
        .instrument(span)
        .await
    }

    /// Run only the precondition checks. Never applies or rolls back anything.
    pub async fn validate_only(mut self) -> TransactionResult {
        let span = tracing::info_span!("validate", tx_id = %self.id, target = %self.target.alias);
        async move {
            let started_at = self.clock.now();
            let started = Instant::now();
            let ctx = StepContext {
                tx_id: self.id,
                source: self.source.as_ref(),
                target: &self.target,
                options: &self.options,
                token_store: self.token_store.as_ref(),
                ssh_manager: self.ssh_manager.as_ref(),
                now: self.clock.now(),
            };
            for step in &self.steps {
                let issues = step.validate(&ctx, ValidationPhase::Pre).await;
                self.state.record_issues(issues);
            }
            let blocked = self.state.fail_validation(self.options.strict_validation);
            self.state.final_state = FinalState::Unchanged;
            tracing::info!(
                phase = "complete",
                ready = !blocked,
                errors = self.state.validation_errors.len(),
                warnings = self.state.warnings.len(),
                "Validation finished"
            );
            self.into_result(!blocked, started_at, started)
        }
        .instrument(span)
        .await
    }

    async fn run(&mut self) {
        let step_names = self.step_names();
        let ctx = StepContext {
            tx_id: self.id,
            source: self.source.as_ref(),
            target: &self.target,
            options: &self.options,
            token_store: self.token_store.as_ref(),
            ssh_manager: self.ssh_manager.as_ref(),
            now: self.clock.now(),
        };
        let options = &self.options;
        let state = &mut self.state;
        let steps = &mut self.steps;

        tracing::info!(
            phase = "start",
            source = ctx.source.map(|s| s.alias.as_str()),
            steps = ?step_names,
            "Starting switch"
        );

        if options.validate_before_switch {
            for step in steps.iter() {
                let issues = step.validate(&ctx, ValidationPhase::Pre).await;
                state.record_issues(issues);
            }
            if state.fail_validation(options.strict_validation) {
                state.final_state = FinalState::Unchanged;
                tracing::warn!(
                    phase = "complete",
                    final_state = %state.final_state,
                    errors = state.validation_errors.len(),
                    "Pre-validation failed; nothing was changed"
                );
                return;
            }
        }

        let deadline = Instant::now() + options.timeout;
        // A step that may have changed something without being counted as completed.
        let mut in_flight = None;

        for (index, step) in steps.iter_mut().enumerate() {
            let name = step.name();
            tracing::info!(phase = "step-apply", step = %name, "Applying step");
            let outcome = tokio::time::timeout_at(deadline, step.apply(&ctx)).await;
            let warnings = step.take_warnings();
            let rejected = warnings
                .first()
                .filter(|_| options.strict_validation)
                .map(|w| w.message.clone());
            state.warnings.extend(warnings);
            match (outcome, rejected) {
                (Ok(Ok(())), Some(message)) => {
                    tracing::warn!(phase = "step-fail", step = %name, warning = %message, "Step raised a warning under strict validation");
                    state.failed_step = Some(StepFailure {
                        step: name,
                        kind: FailureKind::Validation,
                        message,
                    });
                    in_flight = Some(index);
                    break;
                }
                (Ok(Ok(())), None) => state.completed_steps.push(name),
                (Ok(Err(e)), _) => {
                    tracing::warn!(phase = "step-fail", step = %name, error = %e, "Step failed");
                    state.failed_step = Some(StepFailure::from_error(name, &e));
                    break;
                }
                (Err(_), _) => {
                    tracing::warn!(phase = "step-fail", step = %name, timeout = ?options.timeout, "Step timed out");
                    state.failed_step = Some(StepFailure {
                        step: name,
                        kind: FailureKind::Timeout,
                        message: format!("switch deadline of {:?} exceeded", options.timeout),
                    });
                    in_flight = Some(index);
                    break;
                }
            }
        }

        if state.failed_step.is_none() && options.validate_after_switch {
            for step in steps.iter().take(state.completed_steps.len()) {
                let name = step.name();
                match tokio::time::timeout_at(deadline, step.validate(&ctx, ValidationPhase::Post)).await {
                    Ok(issues) => state.record_issues(issues),
                    Err(_) => {
                        state.failed_step = Some(StepFailure {
                            step: name,
                            kind: FailureKind::Timeout,
                            message: format!(
                                "switch deadline of {:?} exceeded during verification",
                                options.timeout
                            ),
                        });
                        break;
                    }
                }
            }
            if state.failed_step.is_none() && state.fail_validation(options.strict_validation) {
                tracing::warn!(phase = "step-fail", step = ?state.failed_step.as_ref().map(|f| f.step), "Post-switch verification failed");
            }
        }

        if state.failed_step.is_none() {
            state.final_state = FinalState::Switched;
            tracing::info!(phase = "complete", final_state = %state.final_state, "Switch complete");
            return;
        }

        let completed = state.completed_steps.len();
        if !options.rollback_on_failure {
            state.uncompensated_steps = state.completed_steps.clone();
            state.uncompensated_steps.extend(in_flight.map(|i| steps[i].name()));
            state.final_state = FinalState::UnchangedButPartial;
            tracing::warn!(
                phase = "complete",
                final_state = %state.final_state,
                uncompensated = ?state.uncompensated_steps,
                "Switch failed with rollback disabled"
            );
            return;
        }

        // Cut off by the deadline or rejected by strict validation; undo whatever it got to.
        if let Some(index) = in_flight {
            let step = &mut steps[index];
            let name = step.name();
            if let Err(e) = step.rollback(&ctx).await {
                tracing::error!(phase = "rollback-step", step = %name, error = %e, "Failed to undo in-flight step");
                state.rollback_failures.push(StepFailure {
                    step: name,
                    kind: FailureKind::Rollback,
                    message: e.to_string(),
                });
                state.uncompensated_steps.push(name);
            }
        }

        state.rollback(&mut steps[..completed], &ctx).await;
        state.final_state = if state.rollback_failures.is_empty() {
            FinalState::RolledBack
        } else {
            FinalState::PartiallyRolledBack
        };
        tracing::info!(
            phase = "complete",
            final_state = %state.final_state,
            rolled_back = ?state.rollback_steps,
            "Switch failed"
        );
    }

    fn into_result(self, success: bool, started_at: chrono::DateTime<chrono::Utc>, started: Instant) -> TransactionResult {
        let state = self.state;
        TransactionResult {
            transaction_id: self.id,
            source: self.source.map(|s| s.alias),
            target: self.target.alias,
            success,
            completed_steps: state.completed_steps,
            failed_step: state.failed_step,
            validation_errors: state.validation_errors,
            warnings: state.warnings,
            rollback_steps: state.rollback_steps,
            rollback_failures: state.rollback_failures,
            uncompensated_steps: state.uncompensated_steps,
            final_state: state.final_state,
            started_at,
            duration: started.elapsed(),
            timeout: self.options.timeout,
        }
    }
}
