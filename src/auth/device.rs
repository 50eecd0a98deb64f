//! src/auth/device.rs
//
// OAuth device authorization: request a user code, then poll until the user
// approves it in the browser.

use crate::config::Endpoints;
use crate::errors::{Error, Result};
use crate::llm::http;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEVICE_CODE_PATH: &str = "login/device/code";
const ACCESS_TOKEN_PATH: &str = "login/oauth/access_token";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SCOPE: &str = "read:user";
/// Added to the interval whenever the server answers `slow_down`.
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

const STEP_REQUEST_CODE: &str = "request device code";
const STEP_POLL: &str = "poll access token";
const STEP_WAIT: &str = "wait for device authorization";

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

impl DeviceCode {
    /// Number of polls that fit in the code's lifetime.
    pub fn max_polls(&self) -> u32 {
        let polls = self.expires_in / self.interval.max(1);
        polls.clamp(1, u32::MAX as u64) as u32
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub interval: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFlowState {
    Requested { interval: Duration, max_polls: u32 },
    Polling { interval: Duration, polls_left: u32 },
    Approved(String),
    Expired,
    Denied,
}

impl DeviceFlowState {
    pub fn start(code: &DeviceCode) -> Self {
        DeviceFlowState::Requested {
            interval: Duration::from_secs(code.interval),
            max_polls: code.max_polls(),
        }
    }

    /// Applies one poll response. `polls_left` already accounts for that poll.
    pub fn after_poll(interval: Duration, polls_left: u32, response: AccessTokenResponse) -> Result<Self> {
        if let Some(token) = response.access_token.filter(|token| !token.is_empty()) {
            return Ok(DeviceFlowState::Approved(token));
        }

        let next = match response.error.as_deref() {
            Some("authorization_pending") | None => interval,
            Some("slow_down") => response
                .interval
                .map(Duration::from_secs)
                .unwrap_or(interval + SLOW_DOWN_STEP),
            Some("expired_token") => return Ok(DeviceFlowState::Expired),
            Some("access_denied") => return Ok(DeviceFlowState::Denied),
            Some(other) => {
                return Err(Error::Protocol {
                    step: STEP_POLL,
                    status: StatusCode::OK,
                    body: response
                        .error_description
                        .unwrap_or_else(|| other.to_string()),
                })
            }
        };

        if polls_left == 0 {
            Ok(DeviceFlowState::Expired)
        } else {
            Ok(DeviceFlowState::Polling {
                interval: next,
                polls_left,
            })
        }
    }
}

pub struct DeviceFlow<'a> {
    http: &'a Client,
    endpoints: &'a Endpoints,
    client_id: &'a str,
}

impl<'a> DeviceFlow<'a> {
    pub fn new(http: &'a Client, endpoints: &'a Endpoints, client_id: &'a str) -> Self {
        Self {
            http,
            endpoints,
            client_id,
        }
    }

    pub async fn request_code(&self, cancel: &CancellationToken) -> Result<DeviceCode> {
        let request = self
            .http
            .post(self.endpoints.github_url(DEVICE_CODE_PATH))
            .header(ACCEPT, "application/json")
            .form(&[("client_id", self.client_id), ("scope", SCOPE)]);
        let body = http::send(STEP_REQUEST_CODE, cancel, request).await?;
        http::decode(STEP_REQUEST_CODE, &body)
    }

    async fn poll_once(&self, cancel: &CancellationToken, code: &DeviceCode) -> Result<AccessTokenResponse> {
        let request = self
            .http
            .post(self.endpoints.github_url(ACCESS_TOKEN_PATH))
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id),
                ("device_code", code.device_code.as_str()),
                ("grant_type", GRANT_TYPE),
            ]);
        let body = http::send(STEP_POLL, cancel, request).await?;
        http::decode(STEP_POLL, &body)
    }

    /// Polls until the code is approved, denied, expires or `cancel` fires.
    pub async fn wait_for_token(&self, cancel: &CancellationToken, code: &DeviceCode) -> Result<String> {
        let mut state = DeviceFlowState::start(code);
        loop {
            state = match state {
                DeviceFlowState::Requested {
                    interval,
                    max_polls,
                } => DeviceFlowState::Polling {
                    interval,
                    polls_left: max_polls,
                },
                DeviceFlowState::Polling {
                    interval,
                    polls_left,
                } => {
                    if polls_left == 0 {
                        DeviceFlowState::Expired
                    } else {
                        wait(cancel, interval).await?;
                        let response = self.poll_once(cancel, code).await?;
                        log::debug!("Device flow poll: {:?}", response.error);
                        DeviceFlowState::after_poll(interval, polls_left - 1, response)?
                    }
                }
                DeviceFlowState::Approved(token) => return Ok(token),
                DeviceFlowState::Expired => return Err(Error::Expired),
                DeviceFlowState::Denied => return Err(Error::Denied),
            };
        }
    }

    /// Full handshake. `on_code` shows the user code and URL before polling starts.
    pub async fn authorize<F>(&self, cancel: &CancellationToken, on_code: F) -> Result<String>
    where
        F: FnOnce(&DeviceCode),
    {
        let code = self.request_code(cancel).await?;
        on_code(&code);
        self.wait_for_token(cancel, &code).await
    }
}

async fn wait(cancel: &CancellationToken, interval: Duration) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled(STEP_WAIT)),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(error: &str) -> AccessTokenResponse {
        AccessTokenResponse {
            error: Some(error.to_string()),
            ..AccessTokenResponse::default()
        }
    }

    fn code(interval: u64, expires_in: u64) -> DeviceCode {
        DeviceCode {
            device_code: "dc-1".to_string(),
            user_code: "ABCD-1234".to_string(),
            verification_uri: "https://github.com/login/device".to_string(),
            expires_in,
            interval,
        }
    }

    #[test]
    fn pending_keeps_polling_with_the_same_interval() {
        let interval = Duration::from_secs(5);
        let state = DeviceFlowState::after_poll(interval, 3, pending("authorization_pending")).unwrap();
        assert_eq!(
            state,
            DeviceFlowState::Polling {
                interval,
                polls_left: 3
            }
        );
    }

    #[test]
    fn slow_down_backs_off() {
        let state =
            DeviceFlowState::after_poll(Duration::from_secs(5), 3, pending("slow_down")).unwrap();
        assert_eq!(
            state,
            DeviceFlowState::Polling {
                interval: Duration::from_secs(10),
                polls_left: 3
            }
        );
    }

    #[test]
    fn terminal_responses() {
        let interval = Duration::from_secs(5);
        let approved = AccessTokenResponse {
            access_token: Some("gho_token".to_string()),
            ..AccessTokenResponse::default()
        };
        assert_eq!(
            DeviceFlowState::after_poll(interval, 3, approved).unwrap(),
            DeviceFlowState::Approved("gho_token".to_string())
        );
        assert_eq!(
            DeviceFlowState::after_poll(interval, 3, pending("expired_token")).unwrap(),
            DeviceFlowState::Expired
        );
        assert_eq!(
            DeviceFlowState::after_poll(interval, 3, pending("access_denied")).unwrap(),
            DeviceFlowState::Denied
        );
        assert_eq!(
            DeviceFlowState::after_poll(interval, 0, pending("authorization_pending")).unwrap(),
            DeviceFlowState::Expired
        );
        assert!(DeviceFlowState::after_poll(interval, 3, pending("incorrect_client_credentials")).is_err());
    }

    #[test]
    fn polls_are_bounded_by_code_lifetime() {
        assert_eq!(code(5, 900).max_polls(), 180);
        assert_eq!(code(0, 3).max_polls(), 3);
        assert_eq!(code(10, 0).max_polls(), 1);
    }

    #[tokio::test]
    async fn approved_code_yields_the_token() {
        let mut server = mockito::Server::new_async().await;
        let code_mock = server
            .mock("POST", "/login/device/code")
            .match_body(mockito::Matcher::UrlEncoded("scope".into(), SCOPE.into()))
            .with_status(200)
            .with_body(
                r#"{"device_code":"dc-1","user_code":"ABCD-1234","verification_uri":"https://github.com/login/device","expires_in":900,"interval":0}"#,
            )
            .create_async()
            .await;
        let token_mock = server
            .mock("POST", "/login/oauth/access_token")
            .match_body(mockito::Matcher::UrlEncoded("device_code".into(), "dc-1".into()))
            .with_status(200)
            .with_body(r#"{"access_token":"gho_token","token_type":"bearer","scope":"read:user"}"#)
            .create_async()
            .await;

        let endpoints = Endpoints {
            github: server.url(),
            ..Endpoints::default()
        };
        let client = http::build_client().unwrap();
        let flow = DeviceFlow::new(&client, &endpoints, "Iv1.x");

        let mut shown = None;
        let token = flow
            .authorize(&CancellationToken::new(), |code| shown = Some(code.user_code.clone()))
            .await
            .unwrap();

        assert_eq!(token, "gho_token");
        assert_eq!(shown.as_deref(), Some("ABCD-1234"));
        code_mock.assert_async().await;
        token_mock.assert_async().await;
    }

    #[tokio::test]
    async fn denied_code_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _denied = server
            .mock("POST", "/login/oauth/access_token")
            .with_status(200)
            .with_body(r#"{"error":"access_denied"}"#)
            .create_async()
            .await;

        let endpoints = Endpoints {
            github: server.url(),
            ..Endpoints::default()
        };
        let client = http::build_client().unwrap();
        let flow = DeviceFlow::new(&client, &endpoints, "Iv1.x");

        let err = flow
            .wait_for_token(&CancellationToken::new(), &code(0, 900))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Denied));
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_wait() {
        let endpoints = Endpoints {
            github: "http://127.0.0.1:9".to_string(),
            ..Endpoints::default()
        };
        let client = http::build_client().unwrap();
        let flow = DeviceFlow::new(&client, &endpoints, "Iv1.x");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = flow.wait_for_token(&cancel, &code(60, 900)).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
