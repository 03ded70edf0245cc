//! Token validation against a fake platform API.

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use gitswitch::token::{GitHubTokenValidator, Token, TokenValidator};
use url::Url;

/// `GET /api/v3/user`: `ghp_jdoe` is jdoe's token, anything else is rejected.
async fn user(headers: HeaderMap) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    match auth {
        "Bearer ghp_jdoe" => (
            StatusCode::OK,
            [("x-oauth-scopes", "repo, read:org")],
            Json(serde_json::json!({ "login": "jdoe", "id": 1 })),
        )
            .into_response(),
        "Bearer ghp_broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

pub async fn fake_platform() -> Url {
    let app = Router::new().route("/api/v3/user", get(user));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/api/v3/")).unwrap()
}

fn validator(base: Url) -> GitHubTokenValidator {
    GitHubTokenValidator::with_base_url(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn known_token_reports_owner_and_scopes() {
    let base = fake_platform().await;
    let identity = validator(base).validate(&Token::new("ghp_jdoe")).await.unwrap();
    assert_eq!(identity.username, "jdoe");
    assert_eq!(identity.scopes, vec!["repo", "read:org"]);
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let base = fake_platform().await;
    let err = validator(base)
        .validate(&Token::new("ghp_revoked"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        gitswitch::Error::Token(gitswitch::token::TokenError::Rejected)
    ));
}

#[tokio::test]
async fn server_error_is_not_a_rejection() {
    let base = fake_platform().await;
    let err = validator(base)
        .validate(&Token::new("ghp_broken"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        gitswitch::Error::Token(gitswitch::token::TokenError::ValidationRequest { status: 500 })
    ));
}
