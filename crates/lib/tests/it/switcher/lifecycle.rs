use gitswitch::{SwitchRequest, TransactionOptions, identity::IdentityRegistry};

use crate::helpers::TestEnv;

#[tokio::test]
async fn removing_current_identity_clears_pointer_and_token() {
    let env = TestEnv::new().await;
    env.switcher
        .switch(SwitchRequest::new("work", TransactionOptions::default()))
        .await
        .unwrap();

    let removed = env.switcher.remove_identity("work").await.unwrap();
    assert_eq!(removed.alias, "work");
    assert_eq!(env.current_alias().await, None);
    assert_eq!(env.active_token().await, None);
    assert!(env.switcher.registry().get("work").await.unwrap_err().is_not_found());

    let status = env.switcher.status().await.unwrap();
    assert!(status.current.is_none());
    assert!(status.state.last_switch.is_some());
}

#[tokio::test]
async fn status_reports_current_identity() {
    let env = TestEnv::new().await;
    env.switcher
        .switch(SwitchRequest::new("personal", TransactionOptions::default()))
        .await
        .unwrap();

    let status = env.switcher.status().await.unwrap();
    assert_eq!(status.current.unwrap().alias, "personal");
    assert_eq!(status.active_token.as_deref(), Some("personal"));
    assert_eq!(status.exports.unwrap()["GITSWITCH_ACCOUNT"], "personal");
}
