use gitswitch::{
    SwitchRequest, TransactionOptions,
    git::{ConfigScope, GitConfigWriter},
    identity::IdentityRegistry,
    transaction::{FinalState, StepName},
};

use crate::helpers::TestEnv;

fn request(alias: &str) -> SwitchRequest {
    SwitchRequest::new(alias, TransactionOptions::default())
}

#[tokio::test]
async fn switch_records_current_identity() {
    let env = TestEnv::new().await;
    assert_eq!(env.current_alias().await, None);

    let result = env.switcher.switch(request("work")).await.unwrap();
    assert_eq!(result.final_state, FinalState::Switched);
    assert_eq!(result.source, None);

    let state = env.switcher.state_file().load().await.unwrap();
    assert_eq!(state.current.as_deref(), Some("work"));
    let record = state.last_switch.unwrap();
    assert_eq!(record.transaction_id, result.transaction_id);
    assert_eq!(record.to, "work");

    let result = env.switcher.switch(request("personal")).await.unwrap();
    assert_eq!(result.source.as_deref(), Some("work"));
    assert_eq!(env.current_alias().await.as_deref(), Some("personal"));
    assert!(!env.data.lock().exists());
}

#[tokio::test]
async fn exports_are_written_to_env_file() {
    let env = TestEnv::new().await;
    env.switcher.switch(request("personal")).await.unwrap();

    let contents = std::fs::read_to_string(env.data.env_file()).unwrap();
    assert!(contents.contains("export GITSWITCH_ACCOUNT='personal'"));
    assert!(contents.contains("IdentitiesOnly=yes"));
    assert!(contents.contains("personal.sock"));
}

#[tokio::test]
async fn missing_key_keeps_previous_identity() {
    let env = TestEnv::new().await;
    env.switcher.switch(request("work")).await.unwrap();
    std::fs::remove_file(env.personal.ssh_key_path.as_ref().unwrap()).unwrap();

    let options = TransactionOptions {
        validate_before_switch: false,
        ..Default::default()
    };
    let result = env
        .switcher
        .switch(SwitchRequest::new("personal", options))
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.failed_step.as_ref().unwrap().step, StepName::SshIsolation);
    assert_eq!(result.completed_steps, vec![StepName::TokenIsolation]);
    assert_eq!(result.rollback_steps, vec![StepName::TokenIsolation]);
    assert_eq!(result.final_state, FinalState::RolledBack);
    assert_eq!(env.current_alias().await.as_deref(), Some("work"));
    assert_eq!(env.active_token().await.as_deref(), Some("work"));
    let git = env.git.read(&ConfigScope::Global).await.unwrap();
    assert_eq!(git.email.as_deref(), Some("jane@corp.example"));
}

#[tokio::test]
async fn validate_only_leaves_state_alone() {
    let env = TestEnv::new().await;
    env.switcher.switch(request("work")).await.unwrap();
    let state_before = env.switcher.state_file().load().await.unwrap();
    let agents_before = env.agent.snapshot();

    let result = env
        .switcher
        .switch(request("personal").validate_only())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.final_state, FinalState::Unchanged);
    assert_eq!(env.switcher.state_file().load().await.unwrap(), state_before);
    assert_eq!(env.agent.snapshot(), agents_before);
    assert_eq!(env.active_token().await.as_deref(), Some("work"));
}

#[tokio::test]
async fn concurrent_switch_is_refused() {
    let env = TestEnv::new().await;
    std::fs::create_dir_all(env.data.root()).unwrap();
    std::fs::write(env.data.lock(), "12345").unwrap();

    let err = env.switcher.switch(request("work")).await.unwrap_err();
    assert_eq!(err.module(), "state");
    assert_eq!(env.current_alias().await, None);
}

#[tokio::test]
async fn unknown_alias_is_not_found() {
    let env = TestEnv::new().await;
    let err = env.switcher.switch(request("nobody")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn identity_without_ssh_isolation_skips_agent() {
    let env = TestEnv::new().await;
    let mut plain = gitswitch::Identity::new("oss", "Jane", "jane@oss.example", "jane-oss");
    plain.requires_ssh_isolation = false;
    env.switcher.registry().add(plain).await.unwrap();

    let result = env.switcher.switch(request("oss")).await.unwrap();

    assert_eq!(result.final_state, FinalState::Switched);
    assert!(!result.completed_steps.contains(&StepName::SshIsolation));
    assert!(env.agent.snapshot().is_empty());
    let contents = std::fs::read_to_string(env.data.env_file()).unwrap();
    assert!(!contents.contains("GIT_SSH_COMMAND"));
    // No token stored for `oss`: switched with a warning and no reachable token
    assert!(!result.warnings.is_empty());
    assert_eq!(env.active_token().await, None);
}

#[tokio::test]
async fn switching_away_stops_the_previous_agent() {
    let env = TestEnv::new().await;
    let mut plain = gitswitch::Identity::new("oss", "Jane", "jane@oss.example", "jane-oss");
    plain.requires_ssh_isolation = false;
    env.switcher.registry().add(plain).await.unwrap();

    env.switcher.switch(request("work")).await.unwrap();
    assert_eq!(env.agent.snapshot().len(), 1);

    let result = env.switcher.switch(request("oss")).await.unwrap();
    assert_eq!(result.final_state, FinalState::Switched);
    assert!(result.completed_steps.contains(&StepName::SshIsolation));
    assert!(env.agent.snapshot().is_empty());
}

#[tokio::test]
async fn local_scope_is_written_separately() {
    let env = TestEnv::new().await;
    let repo = env.dir.path().join("repo");
    let result = env
        .switcher
        .switch(request("personal").with_scope(ConfigScope::Local(repo.clone())))
        .await
        .unwrap();
    assert_eq!(result.final_state, FinalState::Switched);

    let local = env.git.read(&ConfigScope::Local(repo)).await.unwrap();
    assert_eq!(local.email.as_deref(), Some("jane@home.example"));
    let global = env.git.read(&ConfigScope::Global).await.unwrap();
    assert_eq!(global.email, None);
}
