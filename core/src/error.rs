//! Error types for the Bassa API client.
//!
//! # Design
//! Argument problems (`MissingArgument`, `InvalidArgument`) are raised before
//! any request is built, so they never cost a network round-trip. Responses
//! the server refused outright land in `ServerRejected`; retryable statuses
//! that outlived the retry policy land in `RetriesExhausted` so the caller
//! always learns that the call did not succeed.

use thiserror::Error;

/// Errors returned by the Bassa client.
#[derive(Debug, Error)]
pub enum BassaError {
    /// The base URL does not look like an `http(s)://` or `ftp(s)://` server address.
    #[error("invalid server address: {address:?}")]
    InvalidAddress { address: String },

    /// A required argument was empty or absent.
    #[error("missing required argument `{0}`")]
    MissingArgument(&'static str),

    /// An argument was present but malformed.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The server answered with a status that is not worth retrying.
    #[error("server rejected the request with HTTP {status}")]
    ServerRejected { status: u16, body: String },

    /// Every attempt allowed by the retry policy ended in a retryable failure.
    #[error("gave up after {attempts} attempt(s){}", status_suffix(.last_status))]
    RetriesExhausted {
        attempts: u32,
        last_status: Option<u16>,
    },

    /// Login succeeded but the response carried no `token` header.
    #[error("login response did not include a token header")]
    MissingToken,

    /// The request never produced an HTTP response (connect failure, timeout, ...).
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// The response body could not be decoded as JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Client configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BassaError {
    /// The HTTP status associated with this error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            BassaError::ServerRejected { status, .. } => Some(*status),
            BassaError::RetriesExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(", last status HTTP {status}"),
        None => String::new(),
    }
}

impl From<::config::ConfigError> for BassaError {
    fn from(err: ::config::ConfigError) -> Self {
        BassaError::Config(err.to_string())
    }
}
