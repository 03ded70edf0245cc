//! Tests for the transaction module.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use base64ct::{Base64, Encoding};

use super::*;
use crate::{
    FixedClock,
    env::{EnvVars, EnvironmentConfigurator, MemoryEnvironment},
    git::{ConfigScope, GitConfigWriter, GitIdentityConfig, MemoryGitConfig},
    ssh::{
        AgentIsolationManager, MemoryAgent, SshAgent, SshError, SshIsolationConfig, SshSnapshot,
        fingerprint::public_key_path,
    },
    testing::FailAfter,
    token::{Token, TokenMetadata, TokenType, TokenVaultStore},
};

/// Wraps the real manager so verify/restore can be made to fail.
struct FaultySsh {
    inner: AgentIsolationManager<MemoryAgent>,
    verify_faults: FailAfter,
    restore_faults: FailAfter,
}

#[async_trait]
impl SshIsolationManager for FaultySsh {
    fn socket_path(&self, identity: &Identity) -> PathBuf {
        self.inner.socket_path(identity)
    }

    async fn check_key(&self, identity: &Identity) -> Result<()> {
        self.inner.check_key(identity).await
    }

    async fn snapshot(&self, identity: &Identity) -> Result<SshSnapshot> {
        self.inner.snapshot(identity).await
    }

    async fn isolate(&self, identity: &Identity) -> Result<()> {
        self.inner.isolate(identity).await
    }

    async fn verify(&self, identity: &Identity) -> Result<()> {
        if self.verify_faults.trip() {
            return Err(SshError::IsolationViolation {
                alias: identity.alias.clone(),
                expected: "SHA256:expected".into(),
                found: vec!["SHA256:foreign".into()],
            }
            .into());
        }
        self.inner.verify(identity).await
    }

    async fn restore(&self, snapshot: &SshSnapshot) -> Result<()> {
        if self.restore_faults.trip() {
            return Err(SshError::AgentCommand {
                operation: "restore",
                reason: "injected fault".into(),
            }
            .into());
        }
        self.inner.restore(snapshot).await
    }

    async fn release(&self, identity: &Identity) -> Result<()> {
        self.inner.release(identity).await
    }
}

/// Everything a switch can change.
#[derive(Debug, PartialEq)]
struct World {
    git: GitIdentityConfig,
    env: Option<EnvVars>,
    /// Every running agent socket and the fingerprints it holds
    agents: BTreeMap<PathBuf, Vec<String>>,
    active_token: Option<String>,
}

struct Harness {
    _dir: tempfile::TempDir,
    tokens: Arc<TokenVaultStore>,
    agent: Arc<MemoryAgent>,
    ssh: Arc<FaultySsh>,
    git: Arc<MemoryGitConfig>,
    env: Arc<MemoryEnvironment>,
    clock: Arc<FixedClock>,
    work: Identity,
    personal: Identity,
}

fn write_key_pair(dir: &std::path::Path, name: &str) -> PathBuf {
    let key = dir.join(name);
    std::fs::write(&key, "PRIVATE KEY").unwrap();
    let blob = Base64::encode_string(format!("{name}-public").as_bytes());
    std::fs::write(public_key_path(&key), format!("ssh-ed25519 {blob} {name}\n")).unwrap();
    key
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let work_key = write_key_pair(dir.path(), "id_work");
        let personal_key = write_key_pair(dir.path(), "id_personal");

        let clock = Arc::new(FixedClock::default());
        let tokens = Arc::new(TokenVaultStore::in_memory().with_clock(clock.clone()));
        let agent = Arc::new(MemoryAgent::new());
        let ssh = Arc::new(FaultySsh {
            inner: AgentIsolationManager::new(
                agent.clone(),
                dir.path().join("agents"),
                SshIsolationConfig::default(),
            ),
            verify_faults: FailAfter::disarmed(),
            restore_faults: FailAfter::disarmed(),
        });

        let work = Identity::new("work", "Jane Doe", "jane@corp.example", "jdoe-corp")
            .with_ssh_key(work_key);
        let personal = Identity::new("personal", "Jane Doe", "jane@home.example", "janedoe")
            .with_ssh_key(personal_key);

        for identity in [&work, &personal] {
            tokens
                .store_token(
                    &identity.alias,
                    Token::new(format!("ghp_{}", identity.alias)),
                    TokenMetadata::new(&identity.username, TokenType::Classic, clock.now()),
                )
                .await
                .unwrap();
        }

        Self {
            _dir: dir,
            tokens,
            agent,
            ssh,
            git: Arc::new(MemoryGitConfig::new()),
            env: Arc::new(MemoryEnvironment::new()),
            clock,
            work,
            personal,
        }
    }

    /// A harness where `work` is already the active identity.
    async fn as_work() -> Self {
        let h = Self::new().await;
        let result = h
            .transaction(None, &h.work, TransactionOptions::default())
            .execute()
            .await;
        assert_eq!(result.final_state, FinalState::Switched, "{result:?}");
        h
    }

    fn transaction(&self, source: Option<&Identity>, target: &Identity, options: TransactionOptions) -> Transaction {
        let mut tx = Transaction::new(
            source.cloned(),
            target.clone(),
            self.tokens.clone(),
            self.ssh.clone(),
            options,
        )
        .unwrap()
        .with_clock(self.clock.clone());
        tx.add_step(TokenIsolationStep::new())
            .unwrap()
            .add_step(SshIsolationStep::new())
            .unwrap()
            .add_step(GitConfigurationStep::new(self.git.clone(), ConfigScope::Global))
            .unwrap()
            .add_step(EnvironmentStep::new(self.env.clone()))
            .unwrap()
            .add_step(ValidationStep::new())
            .unwrap();
        tx
    }

    async fn switch_to_personal(&self, options: TransactionOptions) -> TransactionResult {
        self.transaction(Some(&self.work), &self.personal, options)
            .execute()
            .await
    }

    async fn world(&self) -> World {
        World {
            git: self.git.read(&ConfigScope::Global).await.unwrap(),
            env: self.env.read().await.unwrap(),
            agents: self.agent.snapshot(),
            active_token: self.tokens.active_alias().await.unwrap(),
        }
    }
}

fn all_steps() -> Vec<StepName> {
    StepName::ALL.to_vec()
}

#[tokio::test]
async fn successful_switch_applies_every_step() {
    let h = Harness::as_work().await;
    let result = h.switch_to_personal(TransactionOptions::default()).await;

    assert!(result.success);
    assert_eq!(result.final_state, FinalState::Switched);
    assert_eq!(result.completed_steps, all_steps());
    assert!(result.rollback_steps.is_empty());
    assert_eq!(result.source.as_deref(), Some("work"));
    assert_eq!(result.target, "personal");

    let world = h.world().await;
    assert_eq!(world.git.email.as_deref(), Some("jane@home.example"));
    assert_eq!(world.active_token.as_deref(), Some("personal"));
    let env = world.env.unwrap();
    assert_eq!(env["GITSWITCH_ACCOUNT"], "personal");
    assert!(env["GIT_SSH_COMMAND"].contains("id_personal"));
    assert!(env["GIT_SSH_COMMAND"].ends_with("-o IdentitiesOnly=yes"));
    assert_eq!(
        PathBuf::from(&env["SSH_AUTH_SOCK"]),
        h.ssh.socket_path(&h.personal)
    );
    assert!(result.into_error().is_ok());
}

/// Make the step at `position` (1-based) fail during apply.
fn inject_apply_fault(h: &Harness, position: usize) {
    match position {
        1 => h.tokens.write_faults().arm(0),
        2 => h.agent.add_faults().arm(0),
        3 => h.git.write_faults().arm(0),
        4 => h.env.write_faults().arm(0),
        5 => h.ssh.verify_faults.arm(0),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn failure_at_each_position_rolls_back_the_prefix_in_reverse() {
    for k in 1..=5 {
        let h = Harness::as_work().await;
        let before = h.world().await;
        inject_apply_fault(&h, k);

        let result = h.switch_to_personal(TransactionOptions::default()).await;

        let expected_completed = StepName::ALL[..k - 1].to_vec();
        let mut expected_rollback = expected_completed.clone();
        expected_rollback.reverse();

        assert!(!result.success, "k={k}");
        assert_eq!(result.completed_steps, expected_completed, "k={k}");
        assert_eq!(result.rollback_steps, expected_rollback, "k={k}");
        assert_eq!(result.failed_step.as_ref().unwrap().step, StepName::ALL[k - 1], "k={k}");
        assert_eq!(result.final_state, FinalState::RolledBack, "k={k}");
        assert!(result.uncompensated_steps.is_empty(), "k={k}");
        assert_eq!(h.world().await, before, "k={k}");
    }
}

#[tokio::test]
async fn pre_validation_failure_changes_nothing() {
    let h = Harness::as_work().await;
    let before = h.world().await;
    std::fs::remove_file(h.personal.ssh_key_path.as_ref().unwrap()).unwrap();

    let result = h.switch_to_personal(TransactionOptions::default()).await;

    assert!(result.completed_steps.is_empty());
    assert!(result.rollback_steps.is_empty());
    assert_eq!(result.final_state, FinalState::Unchanged);
    let failure = result.failed_step.as_ref().unwrap();
    assert_eq!(failure.step, StepName::SshIsolation);
    assert_eq!(failure.kind, FailureKind::Validation);
    assert!(!result.validation_errors.is_empty());
    assert!(result.into_error().unwrap_err().is_validation_error());
    assert_eq!(h.world().await, before);
}

#[tokio::test]
async fn missing_personal_key_rolls_back_token_step() {
    let h = Harness::as_work().await;
    let before = h.world().await;
    std::fs::remove_file(h.personal.ssh_key_path.as_ref().unwrap()).unwrap();

    let options = TransactionOptions {
        validate_before_switch: false,
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;

    assert!(!result.success);
    assert_eq!(result.failed_step.as_ref().unwrap().step, StepName::SshIsolation);
    assert_eq!(result.failed_step.as_ref().unwrap().kind, FailureKind::Apply);
    assert_eq!(result.completed_steps, vec![StepName::TokenIsolation]);
    assert_eq!(result.rollback_steps, vec![StepName::TokenIsolation]);
    assert_eq!(result.final_state, FinalState::RolledBack);
    assert_eq!(h.world().await, before);
    assert_eq!(h.tokens.active_alias().await.unwrap().as_deref(), Some("work"));
}

#[tokio::test]
async fn rollback_failure_does_not_stop_other_rollbacks() {
    let h = Harness::as_work().await;
    h.env.write_faults().arm(0);
    h.ssh.restore_faults.arm(0);

    let result = h.switch_to_personal(TransactionOptions::default()).await;

    assert_eq!(result.final_state, FinalState::PartiallyRolledBack);
    assert_eq!(result.failed_step.as_ref().unwrap().step, StepName::Environment);
    assert_eq!(
        result.rollback_steps,
        vec![StepName::GitConfig, StepName::TokenIsolation]
    );
    assert_eq!(result.rollback_failures.len(), 1);
    assert_eq!(result.rollback_failures[0].step, StepName::SshIsolation);
    assert_eq!(result.rollback_failures[0].kind, FailureKind::Rollback);
    assert_eq!(result.uncompensated_steps, vec![StepName::SshIsolation]);

    // The steps around the failed one were still restored
    let world = h.world().await;
    assert_eq!(world.git.email.as_deref(), Some("jane@corp.example"));
    assert_eq!(world.active_token.as_deref(), Some("work"));
}

#[tokio::test]
async fn post_validation_failure_rolls_back_everything() {
    let h = Harness::as_work().await;
    let before = h.world().await;
    h.git.set_ignore_writes(true);

    let result = h.switch_to_personal(TransactionOptions::default()).await;

    let mut reversed = all_steps();
    reversed.reverse();
    assert!(!result.success);
    assert_eq!(result.completed_steps, all_steps());
    assert_eq!(result.rollback_steps, reversed);
    let failure = result.failed_step.as_ref().unwrap();
    assert_eq!(failure.step, StepName::GitConfig);
    assert_eq!(failure.kind, FailureKind::Validation);
    assert_eq!(result.final_state, FinalState::RolledBack);

    h.git.set_ignore_writes(false);
    assert_eq!(h.world().await, before);
}

#[tokio::test]
async fn post_validation_can_be_disabled() {
    let h = Harness::as_work().await;
    h.git.set_ignore_writes(true);

    let options = TransactionOptions {
        validate_after_switch: false,
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;
    assert_eq!(result.final_state, FinalState::Switched);
}

#[tokio::test]
async fn disabled_rollback_reports_partial_state() {
    let h = Harness::as_work().await;
    h.env.write_faults().arm(0);

    let options = TransactionOptions {
        rollback_on_failure: false,
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;

    let completed = vec![
        StepName::TokenIsolation,
        StepName::SshIsolation,
        StepName::GitConfig,
    ];
    assert_eq!(result.final_state, FinalState::UnchangedButPartial);
    assert_eq!(result.completed_steps, completed);
    assert!(result.rollback_steps.is_empty());
    assert_eq!(result.uncompensated_steps, completed);
    assert_eq!(
        result.rollback_not_attempted(),
        vec![
            StepName::GitConfig,
            StepName::SshIsolation,
            StepName::TokenIsolation
        ]
    );
    // Nothing was undone
    assert_eq!(h.tokens.active_alias().await.unwrap().as_deref(), Some("personal"));
}

#[tokio::test]
async fn deadline_fails_the_step_in_flight() {
    let h = Harness::as_work().await;
    let before = h.world().await;
    h.agent.set_add_delay(Some(Duration::from_secs(5)));

    let options = TransactionOptions {
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;

    let failure = result.failed_step.as_ref().unwrap();
    assert_eq!(failure.step, StepName::SshIsolation);
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(result.completed_steps, vec![StepName::TokenIsolation]);
    assert_eq!(result.rollback_steps, vec![StepName::TokenIsolation]);
    assert_eq!(result.final_state, FinalState::RolledBack);
    assert!(result.duration < Duration::from_secs(5));
    assert!(result.into_error().unwrap_err().is_timeout());
    // The half-started agent for `personal` was shut down again
    assert_eq!(h.world().await, before);
}

#[tokio::test]
async fn failed_undo_of_timed_out_step_is_reported() {
    let h = Harness::as_work().await;
    h.agent.set_add_delay(Some(Duration::from_secs(5)));
    h.ssh.restore_faults.arm(0);

    let options = TransactionOptions {
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;

    let failure = result.failed_step.as_ref().unwrap();
    assert_eq!(failure.step, StepName::SshIsolation);
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(result.rollback_steps, vec![StepName::TokenIsolation]);
    assert_eq!(result.rollback_failures.len(), 1);
    assert_eq!(result.rollback_failures[0].step, StepName::SshIsolation);
    assert_eq!(result.rollback_failures[0].kind, FailureKind::Rollback);
    assert_eq!(result.uncompensated_steps, vec![StepName::SshIsolation]);
    assert_eq!(result.final_state, FinalState::PartiallyRolledBack);
    assert!(result.duration < Duration::from_secs(5));
    assert_eq!(h.tokens.active_alias().await.unwrap().as_deref(), Some("work"));
}

#[tokio::test]
async fn timeout_with_rollback_disabled_leaves_step_in_flight_uncompensated() {
    let h = Harness::as_work().await;
    h.agent.set_add_delay(Some(Duration::from_secs(5)));

    let options = TransactionOptions {
        timeout: Duration::from_millis(50),
        rollback_on_failure: false,
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;

    assert_eq!(result.failed_step.as_ref().unwrap().kind, FailureKind::Timeout);
    assert_eq!(result.final_state, FinalState::UnchangedButPartial);
    assert_eq!(result.completed_steps, vec![StepName::TokenIsolation]);
    assert!(result.rollback_steps.is_empty());
    assert!(result.rollback_failures.is_empty());
    assert_eq!(
        result.uncompensated_steps,
        vec![StepName::TokenIsolation, StepName::SshIsolation]
    );
    assert!(result.duration < Duration::from_secs(5));
    // Nothing was undone: the token stays active and the half-started agent keeps running
    assert_eq!(h.tokens.active_alias().await.unwrap().as_deref(), Some("personal"));
    assert!(h.agent.snapshot().contains_key(&h.ssh.socket_path(&h.personal)));
}

#[tokio::test]
async fn validate_only_never_mutates() {
    let h = Harness::as_work().await;
    let mut metadata = h.tokens.get_token_metadata("personal").await.unwrap();
    metadata.expires_at = Some(h.clock.now() + chrono::Duration::hours(1));
    h.tokens
        .store_token("personal", Token::new("ghp_personal"), metadata)
        .await
        .unwrap();
    h.clock.advance(2 * 60 * 60 * 1000);

    let before = h.world().await;
    let metadata_before = h.tokens.get_token_metadata("personal").await.unwrap();

    let result = h
        .transaction(Some(&h.work), &h.personal, TransactionOptions::default())
        .validate_only()
        .await;

    assert!(!result.success);
    assert_eq!(result.final_state, FinalState::Unchanged);
    assert!(result.completed_steps.is_empty());
    assert!(result.rollback_steps.is_empty());
    assert!(
        result
            .validation_errors
            .iter()
            .any(|i| i.step == StepName::TokenIsolation && i.message.contains("expired"))
    );
    assert_eq!(h.world().await, before);
    assert_eq!(
        h.tokens.get_token_metadata("personal").await.unwrap(),
        metadata_before
    );
}

#[tokio::test]
async fn validate_only_passes_for_ready_identity() {
    let h = Harness::as_work().await;
    let result = h
        .transaction(Some(&h.work), &h.personal, TransactionOptions::default())
        .validate_only()
        .await;
    assert!(result.success);
    assert_eq!(result.final_state, FinalState::Unchanged);
    assert!(result.failed_step.is_none());
}

#[tokio::test]
async fn round_trip_restores_original_state() {
    let h = Harness::as_work().await;
    let original = h.world().await;

    let there = h.switch_to_personal(TransactionOptions::default()).await;
    assert_eq!(there.final_state, FinalState::Switched);
    assert_ne!(h.world().await.git, original.git);

    let back = h
        .transaction(Some(&h.personal), &h.work, TransactionOptions::default())
        .execute()
        .await;
    assert_eq!(back.final_state, FinalState::Switched);

    // Only `work`'s agent is left, holding only `work`'s key
    assert_eq!(h.world().await, original);
    assert_eq!(original.agents.len(), 1);
}

#[tokio::test]
async fn switch_stops_the_source_agent() {
    let h = Harness::as_work().await;
    let result = h.switch_to_personal(TransactionOptions::default()).await;
    assert_eq!(result.final_state, FinalState::Switched);

    let agents = h.agent.snapshot();
    assert_eq!(agents.len(), 1);
    assert!(agents.contains_key(&h.ssh.socket_path(&h.personal)));
}

#[tokio::test]
async fn unrestorable_agent_key_is_a_rollback_failure() {
    let h = Harness::as_work().await;
    let before = h.world().await;
    let personal_socket = h.ssh.socket_path(&h.personal);
    h.agent.ensure_running(&personal_socket, None).await.unwrap();
    h.agent.inject_fingerprint(&personal_socket, "SHA256:other");
    h.env.write_faults().arm(0);

    let result = h.switch_to_personal(TransactionOptions::default()).await;

    assert_eq!(result.final_state, FinalState::PartiallyRolledBack);
    assert_eq!(result.failed_step.as_ref().unwrap().step, StepName::Environment);
    assert_eq!(
        result.rollback_steps,
        vec![StepName::GitConfig, StepName::TokenIsolation]
    );
    assert_eq!(result.rollback_failures.len(), 1);
    assert_eq!(result.rollback_failures[0].step, StepName::SshIsolation);
    assert!(result.rollback_failures[0].message.contains("SHA256:other"));
    assert_eq!(result.uncompensated_steps, vec![StepName::SshIsolation]);

    // The source agent came back even though the target's could not
    let world = h.world().await;
    let work_socket = h.ssh.socket_path(&h.work);
    assert_eq!(world.agents.get(&work_socket), before.agents.get(&work_socket));
    assert_eq!(world.agents.get(&personal_socket), Some(&Vec::new()));
    assert_eq!(world.active_token.as_deref(), Some("work"));
}

#[tokio::test]
async fn missing_token_is_a_warning_unless_strict() {
    let h = Harness::as_work().await;
    h.tokens.remove_token("personal").await.unwrap();

    let strict = TransactionOptions {
        strict_validation: true,
        ..Default::default()
    };
    let result = h.switch_to_personal(strict).await;
    assert_eq!(result.final_state, FinalState::Unchanged);
    assert_eq!(result.failed_step.unwrap().step, StepName::TokenIsolation);

    let result = h.switch_to_personal(TransactionOptions::default()).await;
    assert_eq!(result.final_state, FinalState::Switched);
    assert!(result.warnings.iter().any(|w| w.step == StepName::TokenIsolation));
    // The previous identity's token is no longer reachable
    assert_eq!(h.tokens.active_alias().await.unwrap(), None);
}

#[tokio::test]
async fn strict_mode_rejects_warnings_raised_while_applying() {
    let h = Harness::as_work().await;
    let before = h.world().await;
    h.tokens.remove_token("personal").await.unwrap();

    let options = TransactionOptions {
        strict_validation: true,
        validate_before_switch: false,
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;

    assert!(!result.success);
    let failure = result.failed_step.as_ref().unwrap();
    assert_eq!(failure.step, StepName::TokenIsolation);
    assert_eq!(failure.kind, FailureKind::Validation);
    assert!(failure.message.contains("no token configured"));
    assert!(result.completed_steps.is_empty());
    assert!(result.rollback_failures.is_empty());
    assert_eq!(result.final_state, FinalState::RolledBack);
    assert_eq!(h.world().await, before);
}

#[tokio::test]
async fn strict_mode_without_rollback_leaves_rejected_step_uncompensated() {
    let h = Harness::as_work().await;
    h.tokens.remove_token("personal").await.unwrap();

    let options = TransactionOptions {
        strict_validation: true,
        validate_before_switch: false,
        rollback_on_failure: false,
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;

    assert_eq!(result.final_state, FinalState::UnchangedButPartial);
    assert_eq!(result.uncompensated_steps, vec![StepName::TokenIsolation]);
    assert_eq!(h.tokens.active_alias().await.unwrap(), None);
}

#[tokio::test]
async fn foreign_token_is_an_isolation_violation() {
    let h = Harness::as_work().await;
    let metadata = TokenMetadata::new("jdoe-corp", TokenType::Classic, h.clock.now());
    h.tokens
        .store_token("personal", Token::new("ghp_leaked"), metadata)
        .await
        .unwrap();

    let options = TransactionOptions {
        validate_before_switch: false,
        ..Default::default()
    };
    let result = h.switch_to_personal(options).await;

    let failure = result.failed_step.as_ref().unwrap();
    assert_eq!(failure.step, StepName::TokenIsolation);
    assert_eq!(failure.kind, FailureKind::IsolationViolation);
    assert!(result.into_error().unwrap_err().is_isolation_violation());
    assert_eq!(h.tokens.active_alias().await.unwrap().as_deref(), Some("work"));
}

#[tokio::test]
async fn steps_must_follow_execution_order() {
    let h = Harness::new().await;
    let mut tx = Transaction::new(
        None,
        h.work.clone(),
        h.tokens.clone(),
        h.ssh.clone(),
        TransactionOptions::default(),
    )
    .unwrap();

    tx.add_step(SshIsolationStep::new()).unwrap();
    let err = tx.add_step(TokenIsolationStep::new()).err().unwrap();
    assert!(matches!(
        err,
        crate::Error::Transaction(TransactionError::StepOutOfOrder { .. })
    ));
    let err = tx.add_step(SshIsolationStep::new()).err().unwrap();
    assert!(matches!(
        err,
        crate::Error::Transaction(TransactionError::DuplicateStep { .. })
    ));
    tx.add_step(ValidationStep::new()).unwrap();
    assert_eq!(
        tx.step_names(),
        vec![StepName::SshIsolation, StepName::Validation]
    );
}

#[tokio::test]
async fn concurrent_steps_are_rejected() {
    let h = Harness::new().await;
    let options = TransactionOptions {
        concurrent_steps: true,
        ..Default::default()
    };
    let err = Transaction::new(None, h.work.clone(), h.tokens.clone(), h.ssh.clone(), options)
        .err()
        .unwrap();
    assert!(err.is_validation_error());
}

#[tokio::test]
async fn result_serializes_with_wire_names() {
    let h = Harness::as_work().await;
    h.git.write_faults().arm(0);
    let result = h.switch_to_personal(TransactionOptions::default()).await;

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["final_state"], "rolled-back");
    assert_eq!(json["failed_step"]["step"], "git_config");
    assert_eq!(json["failed_step"]["kind"], "apply");
    assert_eq!(
        json["rollback_steps"],
        serde_json::json!(["ssh_isolation", "token_isolation"])
    );
    let _: BTreeMap<String, serde_json::Value> = serde_json::from_value(json).unwrap();
}
