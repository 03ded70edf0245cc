//! Online token validation against the hosting platform.
//!
//! Only one question is ever asked of the platform: "who does this token
//! authenticate as, and with which scopes".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use serde::Deserialize;
use url::Url;

use super::{Token, TokenError};
use crate::{Result, constants::GITHUB_API_URL};

/// What the platform reports about a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenIdentity {
    pub username: String,
    pub scopes: Vec<String>,
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Ask the platform who `token` belongs to.
    async fn validate(&self, token: &Token) -> Result<TokenIdentity>;
}

#[derive(Deserialize)]
struct UserResponse {
    login: String,
}

/// Validates tokens with `GET {api}/user`.
pub struct GitHubTokenValidator {
    client: reqwest::Client,
    api_base: Url,
}

impl GitHubTokenValidator {
    /// Validator for api.github.com.
    pub fn new(timeout: Duration) -> Result<Self> {
        let api_base = Url::parse(GITHUB_API_URL).map_err(|e| TokenError::Network {
            reason: e.to_string(),
        })?;
        Self::with_base_url(api_base, timeout)
    }

    /// Validator for a GitHub Enterprise or test endpoint.
    pub fn with_base_url(api_base: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gitswitch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TokenError::Network {
                reason: e.to_string(),
            })?;
        Ok(Self { client, api_base })
    }

    fn user_url(&self) -> Result<Url> {
        let base = self.api_base.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/user")).map_err(|e| {
            TokenError::Network {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl TokenValidator for GitHubTokenValidator {
    async fn validate(&self, token: &Token) -> Result<TokenIdentity> {
        let url = self.user_url()?;
        let response = self
            .client
            .get(url)
            .bearer_auth(token.expose())
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| TokenError::Network {
                reason: e.to_string(),
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Err(TokenError::Rejected.into()),
            status if !status.is_success() => {
                return Err(TokenError::ValidationRequest {
                    status: status.as_u16(),
                }
                .into());
            }
            _ => {}
        }

        let scopes = response
            .headers()
            .get("x-oauth-scopes")
            .and_then(|v| v.to_str().ok())
            .map(parse_scopes)
            .unwrap_or_default();
        let user: UserResponse = response.json().await.map_err(|e| TokenError::Network {
            reason: e.to_string(),
        })?;

        tracing::debug!(username = %user.login, scopes = scopes.len(), "Platform confirmed token owner");
        Ok(TokenIdentity {
            username: user.login,
            scopes,
        })
    }
}

fn parse_scopes(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
