//! Caller-held session credentials.
//!
//! # Design
//! The client keeps no mutable header state. The token returned by login
//! and the server key used by the download start/kill endpoints live in a
//! `Session` value that the caller passes into each call, so two callers
//! sharing one client can never overwrite each other's credentials.

/// Server key the Bassa server ships with.
pub const DEFAULT_SERVER_KEY: &str = "123456789";

/// Credentials attached to outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    server_key: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    /// A session with no token, for endpoints that do not require login.
    pub fn anonymous() -> Self {
        Self {
            token: None,
            server_key: DEFAULT_SERVER_KEY.to_string(),
        }
    }

    /// A session carrying a token obtained elsewhere.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::anonymous()
        }
    }

    /// Replace the server key sent to the download start/kill endpoints.
    #[must_use]
    pub fn server_key(mut self, key: impl Into<String>) -> Self {
        self.server_key = key.into();
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn key(&self) -> &str {
        &self.server_key
    }
}
