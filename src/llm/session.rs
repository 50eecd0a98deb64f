//! src/llm/session.rs

use super::http;
use crate::auth::LongLivedCredential;
use crate::config::Endpoints;
use crate::errors::{Error, Result};
use crate::storage;
use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const TOKEN_PATH: &str = "copilot_internal/v2/token";
const STEP_EXCHANGE: &str = "exchange session token";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEndpoints {
    pub api: String,
    #[serde(rename = "origin-tracker")]
    pub origin_tracker: String,
    pub proxy: String,
    pub telemetry: String,
}

/// Short-lived Copilot token plus the capability flags announced with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    /// Unix seconds.
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_in: i64,
    #[serde(default)]
    pub endpoints: SessionEndpoints,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub chat_enabled: bool,
    #[serde(default)]
    pub individual: bool,
    #[serde(default)]
    pub tracking_id: String,
    #[serde(flatten)]
    pub features: BTreeMap<String, serde_json::Value>,
}

impl SessionToken {
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

pub fn new_session_id() -> String {
    format!("{}-{}", Uuid::new_v4(), Utc::now().timestamp_micros())
}

/// Owns the session token and the per-process session id.
#[derive(Debug, Default)]
pub struct SessionManager {
    cache_path: Option<PathBuf>,
    token: Option<SessionToken>,
    session_id: Option<String>,
}

impl SessionManager {
    pub fn new(cache_path: Option<PathBuf>, token: Option<SessionToken>) -> Self {
        Self {
            cache_path,
            token,
            session_id: None,
        }
    }

    /// Picks up a token left by a previous invocation, if any.
    pub async fn load(cache_path: Option<PathBuf>) -> Self {
        let token = match &cache_path {
            Some(path) => storage::load_json(path).await,
            None => None,
        };
        Self::new(cache_path, token)
    }

    #[cfg(test)]
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Generated on first use and kept for the lifetime of the manager,
    /// including across token refreshes.
    pub fn session_id(&mut self) -> &str {
        self.session_id.get_or_insert_with(new_session_id)
    }

    pub fn needs_refresh(&self, now: i64) -> bool {
        !self.token.as_ref().is_some_and(|token| token.is_valid_at(now))
    }

    pub async fn ensure_valid(
        &mut self,
        client: &Client,
        endpoints: &Endpoints,
        cancel: &CancellationToken,
        credential: Option<&LongLivedCredential>,
    ) -> Result<&SessionToken> {
        self.ensure_valid_at(client, endpoints, cancel, credential, Utc::now().timestamp())
            .await
    }

    /// Returns the cached token while `expires_at > now`, otherwise exchanges the
    /// credential for a new one and persists it straight away.
    pub async fn ensure_valid_at(
        &mut self,
        client: &Client,
        endpoints: &Endpoints,
        cancel: &CancellationToken,
        credential: Option<&LongLivedCredential>,
        now: i64,
    ) -> Result<&SessionToken> {
        let credential = credential
            .filter(|credential| !credential.oauth_token.is_empty())
            .ok_or(Error::Unauthenticated)?;

        if self.needs_refresh(now) {
            log::debug!("Session token missing or expired, requesting a new one");
            let token = exchange(client, endpoints, cancel, credential).await?;
            self.token = Some(token);
            if let (Some(path), Some(token)) = (&self.cache_path, &self.token) {
                storage::save_json("save session token", path, token).await?;
            }
        }

        self.session_id();
        self.token.as_ref().ok_or(Error::Unauthenticated)
    }
}

async fn exchange(
    client: &Client,
    endpoints: &Endpoints,
    cancel: &CancellationToken,
    credential: &LongLivedCredential,
) -> Result<SessionToken> {
    let request = client
        .get(endpoints.github_api_url(TOKEN_PATH))
        .bearer_auth(&credential.oauth_token)
        .header(ACCEPT, "application/json");
    let body = http::send(STEP_EXCHANGE, cancel, request).await?;
    http::decode(STEP_EXCHANGE, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRES_AT: i64 = 1_900_000_000;

    fn credential() -> LongLivedCredential {
        LongLivedCredential {
            user: "octocat".to_string(),
            oauth_token: "gho_token".to_string(),
            github_app_id: "Iv1.x".to_string(),
        }
    }

    fn cached(expires_at: i64) -> SessionToken {
        SessionToken {
            token: "cached".to_string(),
            expires_at,
            refresh_in: 1500,
            endpoints: SessionEndpoints::default(),
            sku: String::new(),
            chat_enabled: true,
            individual: true,
            tracking_id: String::new(),
            features: BTreeMap::new(),
        }
    }

    async fn token_server(expect: usize) -> (mockito::ServerGuard, mockito::Mock) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/copilot_internal/v2/token")
            .match_header("authorization", "Bearer gho_token")
            .with_status(200)
            .with_body(format!(
                r#"{{"token":"fresh","expires_at":{},"refresh_in":1500,"chat_enabled":true,"sku":"free_limited_copilot","code_review_enabled":false}}"#,
                EXPIRES_AT + 10_000
            ))
            .expect(expect)
            .create_async()
            .await;
        (server, mock)
    }

    #[test]
    fn refresh_is_needed_exactly_when_expiry_has_passed() {
        let manager = SessionManager::new(None, Some(cached(EXPIRES_AT)));
        for offset in -3..=3 {
            let now = EXPIRES_AT + offset;
            assert_eq!(manager.needs_refresh(now), EXPIRES_AT <= now, "now = expiry {offset:+}");
        }
        assert!(SessionManager::default().needs_refresh(0));
    }

    #[tokio::test]
    async fn valid_token_is_reused_without_network() {
        let (server, mock) = token_server(0).await;
        let endpoints = Endpoints {
            github_api: server.url(),
            ..Endpoints::default()
        };
        let client = http::build_client().unwrap();
        let mut manager = SessionManager::new(None, Some(cached(EXPIRES_AT)));

        let token = manager
            .ensure_valid_at(&client, &endpoints, &CancellationToken::new(), Some(&credential()), EXPIRES_AT - 1)
            .await
            .unwrap();

        assert_eq!(token.token, "cached");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_persisted() {
        let (server, mock) = token_server(1).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let endpoints = Endpoints {
            github_api: server.url(),
            ..Endpoints::default()
        };
        let client = http::build_client().unwrap();
        let mut manager = SessionManager::new(Some(path.clone()), Some(cached(EXPIRES_AT)));
        let session_before = manager.session_id().to_string();

        let token = manager
            .ensure_valid_at(&client, &endpoints, &CancellationToken::new(), Some(&credential()), EXPIRES_AT)
            .await
            .unwrap();
        assert_eq!(token.token, "fresh");
        assert_eq!(token.features["code_review_enabled"], serde_json::json!(false));

        assert_eq!(manager.session_id(), session_before);
        let reloaded = SessionManager::load(Some(path)).await;
        assert_eq!(reloaded.token().unwrap().token, "fresh");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_credential_is_unauthenticated() {
        let client = http::build_client().unwrap();
        let mut manager = SessionManager::new(None, Some(cached(EXPIRES_AT)));

        let err = manager
            .ensure_valid_at(&client, &Endpoints::default(), &CancellationToken::new(), None, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }

    #[tokio::test]
    async fn failed_exchange_keeps_the_old_state() {
        let mut server = mockito::Server::new_async().await;
        let _rejected = server
            .mock("GET", "/copilot_internal/v2/token")
            .with_status(401)
            .with_body(r#"{"message":"Bad credentials"}"#)
            .create_async()
            .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let endpoints = Endpoints {
            github_api: server.url(),
            ..Endpoints::default()
        };
        let client = http::build_client().unwrap();
        let mut manager = SessionManager::new(Some(path.clone()), None);

        let err = manager
            .ensure_valid_at(&client, &endpoints, &CancellationToken::new(), Some(&credential()), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Protocol { step: STEP_EXCHANGE, .. }));
        assert!(manager.token().is_none());
        assert!(!path.exists());
    }
}
