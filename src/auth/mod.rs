//! src/auth/mod.rs

pub mod device;
pub mod store;

pub use device::DeviceFlow;
pub use store::{CredentialStore, LongLivedCredential};

use crate::config::Endpoints;
use crate::errors::Result;
use crate::llm::http;
use reqwest::Client;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const STEP_FETCH_USER: &str = "fetch user info";

#[derive(Debug, Clone, Deserialize)]
pub struct GithubUser {
    pub login: String,
    #[serde(default)]
    pub id: u64,
}

/// Resolves the account behind an OAuth token. Also serves as a validity check.
pub async fn fetch_user(
    client: &Client,
    endpoints: &Endpoints,
    cancel: &CancellationToken,
    token: &str,
) -> Result<GithubUser> {
    let request = client.get(endpoints.github_api_url("user")).bearer_auth(token);
    let body = http::send(STEP_FETCH_USER, cancel, request).await?;
    http::decode(STEP_FETCH_USER, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_is_fetched_with_bearer_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/user")
            .match_header("authorization", "Bearer gho_token")
            .with_status(200)
            .with_body(r#"{"login":"octocat","id":1}"#)
            .create_async()
            .await;

        let endpoints = Endpoints {
            github_api: server.url(),
            ..Endpoints::default()
        };
        let client = http::build_client().unwrap();
        let user = fetch_user(&client, &endpoints, &CancellationToken::new(), "gho_token")
            .await
            .unwrap();

        assert_eq!(user.login, "octocat");
        mock.assert_async().await;
    }
}
