//! Identity lookup and storage
//!
//! The transaction engine only ever *reads* identities. Creating and removing
//! them is host-level glue for the CLI.

use std::{collections::BTreeMap, path::PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{Identity, IdentityError};
use crate::{
    Result,
    persist::{self, Visibility},
};

/// Alias → identity lookup supplied to the switcher.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Look up one identity by alias.
    async fn get(&self, alias: &str) -> Result<Identity>;

    /// All identities, sorted by alias.
    async fn list(&self) -> Result<Vec<Identity>>;

    /// Add a new identity. Fails if the alias is taken.
    async fn add(&self, identity: Identity) -> Result<()>;

    /// Remove an identity and return it.
    async fn remove(&self, alias: &str) -> Result<Identity>;
}

#[derive(Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: BTreeMap<String, Identity>,
}

/// Registry backed by a JSON file, or purely in memory when no path is given.
pub struct JsonRegistry {
    path: Option<PathBuf>,
    accounts: RwLock<BTreeMap<String, Identity>>,
}

impl JsonRegistry {
    /// An empty registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            accounts: RwLock::new(BTreeMap::new()),
        }
    }

    /// An in-memory registry pre-populated with `identities`.
    pub fn with_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        let accounts = identities
            .into_iter()
            .map(|id| (id.alias.clone(), id))
            .collect();
        Self {
            path: None,
            accounts: RwLock::new(accounts),
        }
    }

    /// Load the registry at `path`; a missing file is an empty registry.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file: AccountsFile = persist::read_json(&path).await?.unwrap_or_default();
        tracing::debug!(path = %path.display(), count = file.accounts.len(), "Loaded identity registry");
        Ok(Self {
            path: Some(path),
            accounts: RwLock::new(file.accounts),
        })
    }

    async fn save(&self, accounts: &BTreeMap<String, Identity>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = AccountsFile {
            accounts: accounts.clone(),
        };
        persist::write_json(path, &file, Visibility::Normal).await
    }
}

#[async_trait]
impl IdentityRegistry for JsonRegistry {
    async fn get(&self, alias: &str) -> Result<Identity> {
        let accounts = self.accounts.read().await;
        accounts.get(alias).cloned().ok_or_else(|| {
            IdentityError::NotFound {
                alias: alias.to_string(),
            }
            .into()
        })
    }

    async fn list(&self) -> Result<Vec<Identity>> {
        Ok(self.accounts.read().await.values().cloned().collect())
    }

    async fn add(&self, identity: Identity) -> Result<()> {
        identity.validate()?;
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&identity.alias) {
            return Err(IdentityError::AlreadyExists {
                alias: identity.alias,
            }
            .into());
        }
        let alias = identity.alias.clone();
        accounts.insert(alias.clone(), identity);
        if let Err(e) = self.save(&accounts).await {
            accounts.remove(&alias);
            return Err(e);
        }
        tracing::info!(alias = %alias, "Added identity");
        Ok(())
    }

    async fn remove(&self, alias: &str) -> Result<Identity> {
        let mut accounts = self.accounts.write().await;
        let removed = accounts
            .remove(alias)
            .ok_or_else(|| IdentityError::NotFound {
                alias: alias.to_string(),
            })?;
        if let Err(e) = self.save(&accounts).await {
            accounts.insert(alias.to_string(), removed);
            return Err(e);
        }
        tracing::info!(alias = %alias, "Removed identity");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personal() -> Identity {
        Identity::new("personal", "Jane", "jane@home.example", "jane")
            .with_ssh_key("/home/jane/.ssh/id_personal")
    }

    #[tokio::test]
    async fn add_get_remove() {
        let registry = JsonRegistry::in_memory();
        registry.add(personal()).await.unwrap();
        assert_eq!(registry.get("personal").await.unwrap(), personal());

        let err = registry.add(personal()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Identity(IdentityError::AlreadyExists { .. })
        ));

        registry.remove("personal").await.unwrap();
        assert!(registry.get("personal").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn invalid_identity_is_rejected() {
        let registry = JsonRegistry::in_memory();
        let mut id = personal();
        id.email = "nope".into();
        assert!(registry.add(id).await.unwrap_err().is_validation_error());
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_registry_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        {
            let registry = JsonRegistry::open(&path).await.unwrap();
            registry.add(personal()).await.unwrap();
        }
        let reopened = JsonRegistry::open(&path).await.unwrap();
        let all = reopened.list().await.unwrap();
        assert_eq!(all, vec![personal()]);
    }
}
