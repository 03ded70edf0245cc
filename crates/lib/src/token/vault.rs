//! JSON-file token vault.
//!
//! The vault file is written owner-only and replaced atomically. With no path
//! it behaves as a purely in-memory store, which is what the tests use.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{Token, TokenError, TokenIsolationStore, TokenMetadata, TokenValidator};
use crate::{
    Clock, Result, SystemClock,
    persist::{self, Visibility},
    testing::FailAfter,
};

#[derive(Clone, Serialize, Deserialize)]
struct VaultEntry {
    token: Token,
    metadata: TokenMetadata,
}

#[derive(Clone, Default, Serialize, Deserialize)]
struct VaultFile {
    #[serde(default)]
    active: Option<String>,
    #[serde(default)]
    tokens: BTreeMap<String, VaultEntry>,
}

/// Token vault backed by a JSON file or memory.
///
/// When a [`TokenValidator`] is attached, `validate_token_isolation` asks the
/// platform who the token belongs to instead of trusting stored metadata, and
/// records the answer.
pub struct TokenVaultStore {
    path: Option<PathBuf>,
    vault: RwLock<VaultFile>,
    clock: Arc<dyn Clock>,
    validator: Option<Arc<dyn TokenValidator>>,
    write_faults: FailAfter,
}

impl TokenVaultStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            vault: RwLock::new(VaultFile::default()),
            clock: Arc::new(SystemClock),
            validator: None,
            write_faults: FailAfter::disarmed(),
        }
    }

    /// Open the vault at `path`; a missing file is an empty vault.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let vault: VaultFile = persist::read_json(&path).await?.unwrap_or_default();
        Ok(Self {
            path: Some(path),
            vault: RwLock::new(vault),
            ..Self::in_memory()
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn TokenValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Fault injection for `set_active`; see [`FailAfter`].
    pub fn write_faults(&self) -> &FailAfter {
        &self.write_faults
    }

    async fn save(&self, vault: &VaultFile) -> Result<()> {
        match &self.path {
            Some(path) => persist::write_json(path, vault, Visibility::Private).await,
            None => Ok(()),
        }
    }

    fn not_found(alias: &str) -> crate::Error {
        TokenError::NotFound {
            alias: alias.to_string(),
        }
        .into()
    }

    /// Ask the platform about the token and fold the answer into stored metadata.
    async fn refresh_from_platform(
        &self,
        alias: &str,
        validator: &dyn TokenValidator,
    ) -> Result<()> {
        let token = self.get_token(alias).await?;
        let outcome = validator.validate(&token).await;

        let mut vault = self.vault.write().await;
        let entry = vault
            .tokens
            .get_mut(alias)
            .ok_or_else(|| Self::not_found(alias))?;
        match outcome {
            Ok(identity) => {
                entry.metadata.username = identity.username;
                entry.metadata.scopes = identity.scopes;
                entry.metadata.valid = true;
            }
            Err(crate::Error::Token(TokenError::Rejected)) => {
                tracing::warn!(alias, "Platform rejected stored token; marking invalid");
                entry.metadata.valid = false;
            }
            Err(e) => return Err(e),
        }
        let snapshot = vault.clone();
        drop(vault);
        self.save(&snapshot).await
    }
}

#[async_trait]
impl TokenIsolationStore for TokenVaultStore {
    async fn get_token(&self, alias: &str) -> Result<Token> {
        let vault = self.vault.read().await;
        vault
            .tokens
            .get(alias)
            .map(|entry| entry.token.clone())
            .ok_or_else(|| Self::not_found(alias))
    }

    async fn validate_token_isolation(&self, alias: &str, expected_username: &str) -> Result<()> {
        if let Some(validator) = self.validator.clone() {
            self.refresh_from_platform(alias, validator.as_ref()).await?;
        }

        let now = self.clock.now();
        let mut vault = self.vault.write().await;
        let entry = vault
            .tokens
            .get_mut(alias)
            .ok_or_else(|| Self::not_found(alias))?;

        entry.metadata.check_usable(alias, now)?;
        if !entry.metadata.belongs_to(expected_username) {
            tracing::error!(
                alias,
                expected = expected_username,
                actual = %entry.metadata.username,
                "Token belongs to a different user"
            );
            return Err(TokenError::IsolationViolation {
                alias: alias.to_string(),
                expected: expected_username.to_string(),
                actual: entry.metadata.username.clone(),
            }
            .into());
        }

        entry.metadata.last_used = Some(now);
        let snapshot = vault.clone();
        drop(vault);
        self.save(&snapshot).await
    }

    async fn get_token_metadata(&self, alias: &str) -> Result<TokenMetadata> {
        let vault = self.vault.read().await;
        vault
            .tokens
            .get(alias)
            .map(|entry| entry.metadata.clone())
            .ok_or_else(|| Self::not_found(alias))
    }

    async fn active_alias(&self) -> Result<Option<String>> {
        Ok(self.vault.read().await.active.clone())
    }

    async fn set_active(&self, alias: Option<&str>) -> Result<()> {
        if self.write_faults.trip() {
            return Err(TokenError::StoreWrite {
                reason: "injected fault".to_string(),
            }
            .into());
        }
        let mut vault = self.vault.write().await;
        if let Some(alias) = alias.filter(|a| !vault.tokens.contains_key(*a)) {
            return Err(Self::not_found(alias));
        }
        let new_active = alias.map(String::from);
        if vault.active == new_active {
            return Ok(());
        }
        let previous = std::mem::replace(&mut vault.active, new_active);
        let snapshot = vault.clone();
        if let Err(e) = self.save(&snapshot).await {
            vault.active = previous;
            return Err(e);
        }
        Ok(())
    }

    async fn store_token(&self, alias: &str, token: Token, metadata: TokenMetadata) -> Result<()> {
        let mut vault = self.vault.write().await;
        vault
            .tokens
            .insert(alias.to_string(), VaultEntry { token, metadata });
        let snapshot = vault.clone();
        drop(vault);
        self.save(&snapshot).await?;
        tracing::info!(alias, "Stored token");
        Ok(())
    }

    async fn remove_token(&self, alias: &str) -> Result<()> {
        let mut vault = self.vault.write().await;
        if vault.tokens.remove(alias).is_none() {
            return Err(Self::not_found(alias));
        }
        if vault.active.as_deref() == Some(alias) {
            vault.active = None;
        }
        let snapshot = vault.clone();
        drop(vault);
        self.save(&snapshot).await
    }
}
