//! Token isolation store
//!
//! A per-identity vault for API tokens. Exactly one alias is *active* at a
//! time (its token is the one tools may use); switching changes the active
//! alias. The store also answers "does this token really belong to the user
//! we think it does", which is how cross-identity leakage is detected.
//!
//! "No token configured" ([`TokenError::NotFound`]) is deliberately distinct
//! from "token invalid": the former only means the account is SSH-only.

pub mod errors;
pub mod validator;
pub mod vault;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub use errors::TokenError;
pub use validator::{GitHubTokenValidator, TokenIdentity, TokenValidator};
pub use vault::TokenVaultStore;

use crate::Result;

/// An opaque API token. The secret is zeroized on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(Zeroizing<String>);

impl Token {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    /// The raw secret. Keep the borrow short.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl Serialize for Token {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Token::new)
    }
}

/// Kind of token, inferred from its prefix when stored.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    /// Classic personal access token (`ghp_`)
    Classic,
    /// Fine-grained personal access token (`github_pat_`)
    FineGrained,
    /// OAuth app token (`gho_`)
    OAuth,
    Unknown,
}

impl TokenType {
    pub fn detect(secret: &str) -> Self {
        if secret.starts_with("github_pat_") {
            TokenType::FineGrained
        } else if secret.starts_with("ghp_") {
            TokenType::Classic
        } else if secret.starts_with("gho_") {
            TokenType::OAuth
        } else {
            TokenType::Unknown
        }
    }
}

/// Everything known about a stored token except the secret itself.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    /// Platform user the token authenticates as
    pub username: String,
    pub token_type: TokenType,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    /// Cleared when the platform rejects the token
    pub valid: bool,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenMetadata {
    pub fn new(username: impl Into<String>, token_type: TokenType, created_at: DateTime<Utc>) -> Self {
        Self {
            username: username.into(),
            token_type,
            created_at,
            last_used: None,
            valid: true,
            scopes: Vec::new(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Check validity and expiry, naming `alias` in the error.
    pub fn check_usable(&self, alias: &str, now: DateTime<Utc>) -> std::result::Result<(), TokenError> {
        if !self.valid {
            return Err(TokenError::Invalid {
                alias: alias.to_string(),
            });
        }
        if let Some(expired_at) = self.expires_at.filter(|_| self.is_expired(now)) {
            return Err(TokenError::Expired {
                alias: alias.to_string(),
                expired_at: expired_at.to_rfc3339(),
            });
        }
        Ok(())
    }

    /// Platform usernames are case-insensitive.
    pub fn belongs_to(&self, username: &str) -> bool {
        self.username.eq_ignore_ascii_case(username)
    }
}

/// Per-identity credential vault.
#[async_trait]
pub trait TokenIsolationStore: Send + Sync {
    /// The token for `alias`, or [`TokenError::NotFound`].
    async fn get_token(&self, alias: &str) -> Result<Token>;

    /// Confirm the token for `alias` is usable and belongs to `expected_username`.
    ///
    /// Fails with [`TokenError::IsolationViolation`] on a username mismatch.
    /// Success updates `last_used`.
    async fn validate_token_isolation(&self, alias: &str, expected_username: &str) -> Result<()>;

    async fn get_token_metadata(&self, alias: &str) -> Result<TokenMetadata>;

    /// Alias whose token is currently reachable, if any.
    async fn active_alias(&self) -> Result<Option<String>>;

    /// Make `alias`'s token the reachable one, or none.
    async fn set_active(&self, alias: Option<&str>) -> Result<()>;

    /// Store or replace the token for `alias`.
    async fn store_token(&self, alias: &str, token: Token, metadata: TokenMetadata) -> Result<()>;

    /// Remove the token for `alias`. Clears the active pointer if it named `alias`.
    async fn remove_token(&self, alias: &str) -> Result<()>;
}
