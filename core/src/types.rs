//! Argument types for the user-management endpoints.
//!
//! # Design
//! The server takes flat form fields, so these types only exist to keep the
//! call sites readable and to pin down wire values such as the numeric auth
//! level. Response bodies are left as `serde_json::Value`; their shape
//! belongs to the server.

use serde::{Deserialize, Serialize};

/// Privilege level of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthLevel {
    Admin,
    #[default]
    Regular,
}

impl AuthLevel {
    /// Numeric value the server expects: `0` for admins, `1` for regular users.
    pub fn wire_value(self) -> &'static str {
        match self {
            AuthLevel::Admin => "0",
            AuthLevel::Regular => "1",
        }
    }
}

/// Sign-up data for a new account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub user_name: String,
    pub password: String,
    pub email: String,
}

impl NewUser {
    pub fn new(
        user_name: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            password: password.into(),
            email: email.into(),
        }
    }
}

/// Replacement values for an existing account. Every field is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUpdate {
    pub user_name: String,
    pub password: String,
    pub auth_level: AuthLevel,
    pub email: String,
}
