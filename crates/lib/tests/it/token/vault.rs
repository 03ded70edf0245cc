//! Token vault persistence and platform-backed isolation checks.

use std::sync::Arc;

use gitswitch::{
    Clock, FixedClock,
    token::{Token, TokenIsolationStore, TokenMetadata, TokenType, TokenVaultStore},
};

use super::platform::fake_platform;

fn metadata(username: &str, clock: &FixedClock) -> TokenMetadata {
    TokenMetadata::new(username, TokenType::Classic, clock.now())
}

#[tokio::test]
async fn vault_survives_reopen_with_owner_only_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    let clock = FixedClock::default();

    let vault = TokenVaultStore::open(&path).await.unwrap();
    vault
        .store_token("work", Token::new("ghp_work"), metadata("jdoe", &clock))
        .await
        .unwrap();
    vault.set_active(Some("work")).await.unwrap();
    drop(vault);

    let reopened = TokenVaultStore::open(&path).await.unwrap();
    assert_eq!(reopened.active_alias().await.unwrap().as_deref(), Some("work"));
    assert_eq!(reopened.get_token("work").await.unwrap().expose(), "ghp_work");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn platform_owner_is_checked_against_identity() {
    let base = fake_platform().await;
    let validator = gitswitch::token::GitHubTokenValidator::with_base_url(
        base,
        std::time::Duration::from_secs(5),
    )
    .unwrap();
    let clock = Arc::new(FixedClock::default());
    let vault = TokenVaultStore::in_memory()
        .with_clock(clock.clone())
        .with_validator(Arc::new(validator));

    // Stored metadata claims the token belongs to someone else; the platform knows better.
    vault
        .store_token("work", Token::new("ghp_jdoe"), metadata("stale-name", &clock))
        .await
        .unwrap();
    vault.validate_token_isolation("work", "jdoe").await.unwrap();
    let meta = vault.get_token_metadata("work").await.unwrap();
    assert_eq!(meta.username, "jdoe");
    assert_eq!(meta.last_used, Some(clock.now()));
    assert_eq!(meta.scopes, vec!["repo", "read:org"]);

    let err = vault
        .validate_token_isolation("work", "someone-else")
        .await
        .unwrap_err();
    assert!(err.is_isolation_violation());
}

#[tokio::test]
async fn revoked_token_is_marked_invalid() {
    let base = fake_platform().await;
    let validator = gitswitch::token::GitHubTokenValidator::with_base_url(
        base,
        std::time::Duration::from_secs(5),
    )
    .unwrap();
    let clock = FixedClock::default();
    let vault = TokenVaultStore::in_memory().with_validator(Arc::new(validator));
    vault
        .store_token("work", Token::new("ghp_revoked"), metadata("jdoe", &clock))
        .await
        .unwrap();

    let err = vault.validate_token_isolation("work", "jdoe").await.unwrap_err();
    assert!(matches!(
        err,
        gitswitch::Error::Token(ref e) if e.is_invalid()
    ));
    assert!(!vault.get_token_metadata("work").await.unwrap().valid);
}
