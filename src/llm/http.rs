//! src/llm/http.rs

use crate::errors::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::env;
use tokio_util::sync::CancellationToken;

pub const EDITOR_VERSION: &str = "Neovim/0.10.4";
pub const PLUGIN_VERSION: &str = concat!("lazycopilot/v", env!("CARGO_PKG_VERSION"));

/// Client identification sent with every request.
const VERSION_HEADERS: &[(&str, &str)] = &[
    ("editor-version", EDITOR_VERSION),
    ("editor-plugin-version", PLUGIN_VERSION),
    ("sec-fetch-site", "none"),
    ("sec-fetch-mode", "no-cors"),
    ("sec-fetch-dest", "empty"),
    ("priority", "u=4, i"),
];

/// Extra headers for a single request, applied on top of the client defaults.
pub type Headers = Vec<(&'static str, String)>;

fn version_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in VERSION_HEADERS {
        headers.insert(
            HeaderName::from_static(*name),
            HeaderValue::from_static(*value),
        );
    }
    headers
}

/// Builds the shared HTTP client, honouring `ALL_PROXY` / `HTTPS_PROXY` and `NO_PROXY`.
pub fn build_client() -> Result<Client> {
    let builder = Client::builder()
        .user_agent(PLUGIN_VERSION)
        .default_headers(version_headers());

    // 强制从环境变量构建代理
    let proxy_url = env::var("ALL_PROXY").or_else(|_| env::var("HTTPS_PROXY")).ok();
    let builder = match proxy_url {
        Some(url) => {
            let proxy = reqwest::Proxy::all(&url).map_err(|source| Error::Transport {
                step: "configure proxy",
                source,
            })?;
            builder.proxy(proxy.no_proxy(reqwest::NoProxy::from_env()))
        }
        None => builder,
    };

    builder.build().map_err(|source| Error::Transport {
        step: "build http client",
        source,
    })
}

/// Sets `headers` on the request, replacing any value already present under the same name.
pub fn with_headers(mut request: RequestBuilder, headers: &Headers) -> RequestBuilder {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            // 非法的头交给 reqwest，发送时报 Transport 错误
            _ => request = request.header(*name, value.as_str()),
        }
    }
    request.headers(map)
}

/// Sends one request and returns the body of a `200 OK` response.
///
/// Anything other than 200 is a [`Error::Protocol`]. Cancelling `cancel` drops the
/// in-flight request and yields [`Error::Cancelled`].
pub async fn send(step: &'static str, cancel: &CancellationToken, request: RequestBuilder) -> Result<String> {
    let exchange = async {
        let response = request
            .send()
            .await
            .map_err(|source| Error::Transport { step, source })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| Error::Transport { step, source })?;

        if status != StatusCode::OK {
            return Err(Error::Protocol {
                step,
                status,
                body: body.trim().to_string(),
            });
        }
        Ok(body)
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled(step)),
        result = exchange => result,
    }
}

pub fn decode<T: DeserializeOwned>(step: &'static str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|source| Error::Decode { step, source })
}
