//! Validated server base URLs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::BassaError;

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:http|ftp)s?://",
        r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)",
        r"|localhost",
        r"|\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
        r"(?::\d+)?",
        r"(?:/?|[/?]\S+)$",
    ))
    .expect("address pattern compiles")
});

/// A server base URL that passed validation.
///
/// Scheme is `http`, `https`, `ftp` or `ftps`; host is a dotted domain,
/// `localhost`, or a dotted-quad IPv4 address; port and path are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn parse(address: &str) -> Result<Self, BassaError> {
        if ADDRESS.is_match(address) {
            Ok(Self(address.to_string()))
        } else {
            Err(BassaError::InvalidAddress {
                address: address.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append an absolute endpoint path (starting with `/`) to the base URL.
    pub fn join(&self, path: &str) -> String {
        format!("{}{path}", self.0.trim_end_matches('/'))
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for BaseUrl {
    type Err = BassaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
