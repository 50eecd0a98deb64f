//! src/errors.rs

use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the Copilot client, the credential store and the style registry.
///
/// Every variant that can come out of a multi-step operation carries the name of
/// the step that failed so the CLI can print a single meaningful line.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not authenticated with GitHub, run `lazycopilot login` first")]
    Unauthenticated,

    #[error("{step}: request failed: {source}")]
    Transport {
        step: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{step}: server responded with {status}: {body}")]
    Protocol {
        step: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{step}: could not decode response: {source}")]
    Decode {
        step: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}: no content produced")]
    EmptyResult(&'static str),

    #[error("style '{0}' not found")]
    NotFound(String),

    #[error("style '{0}' already exists")]
    Conflict(String),

    #[error("{0}: cancelled")]
    Cancelled(&'static str),

    #[error("model '{0}' is not available for this account")]
    ModelUnavailable(String),

    #[error("device code expired before the authorization was approved")]
    Expired,

    #[error("authorization request was denied")]
    Denied,

    #[error("{step}: {source}")]
    Io {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("git {step} failed: {message}")]
    Git { step: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(step: &'static str, source: std::io::Error) -> Self {
        Error::Io { step, source }
    }

    pub fn git(step: &'static str, message: impl Into<String>) -> Self {
        Error::Git {
            step,
            message: message.into(),
        }
    }

    /// True when the error came from the user aborting the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}
