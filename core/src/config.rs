//! Client configuration.
//!
//! # Design
//! Settings come from an optional file (TOML or JSON, picked by extension)
//! overlaid by `BASSA_*` environment variables. Nested keys use a double
//! underscore, e.g. `BASSA_RETRY__TOTAL=3` or `BASSA_RETRY__MODE=transport`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::BassaError;
use crate::retry::RetryPolicy;
use crate::session::DEFAULT_SERVER_KEY;

const ENV_PREFIX: &str = "BASSA";

fn default_timeout_secs() -> u64 {
    5
}

fn default_total() -> i64 {
    1
}

fn default_backoff_factor_secs() -> f64 {
    1.0
}

fn default_server_key() -> String {
    DEFAULT_SERVER_KEY.to_string()
}

/// Where retries happen and which failures they cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Retry any 5xx immediately; see [`RetryPolicy::per_call`].
    #[default]
    PerCall,
    /// Retry 429/500/502/503/504 and connection failures of idempotent
    /// requests with exponential backoff; see [`RetryPolicy::transport`].
    Transport,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RetryConfig {
    /// Retry budget. Negative values mean "never retry".
    #[serde(default = "default_total")]
    pub total: i64,
    /// Seed of the exponential backoff, in seconds. Ignored in `per_call` mode.
    #[serde(default = "default_backoff_factor_secs")]
    pub backoff_factor_secs: f64,
    #[serde(default)]
    pub mode: RetryMode,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            total: default_total(),
            backoff_factor_secs: default_backoff_factor_secs(),
            mode: RetryMode::default(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, BassaError> {
        match self.mode {
            RetryMode::PerCall => Ok(RetryPolicy::from_budget(self.total)),
            RetryMode::Transport => {
                let factor = Duration::try_from_secs_f64(self.backoff_factor_secs).map_err(|e| {
                    BassaError::Config(format!(
                        "retry.backoff_factor_secs = {}: {e}",
                        self.backoff_factor_secs
                    ))
                })?;
                let total = u32::try_from(self.total.max(0)).unwrap_or(u32::MAX);
                Ok(RetryPolicy::transport(total, factor))
            }
        }
    }
}

/// Everything needed to build a connected client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    pub api_url: String,
    /// Per-attempt timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Key sent to the download start/kill endpoints.
    #[serde(default = "default_server_key")]
    pub server_key: String,
}

impl ClientConfig {
    /// Defaults for everything except the server address.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
            server_key: default_server_key(),
        }
    }

    /// Load from `path` (if given) and then from `BASSA_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, BassaError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "loading client configuration file");
            builder = builder.add_source(::config::File::from(path));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let config: ClientConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no request could succeed with.
    pub fn validate(&self) -> Result<(), BassaError> {
        if self.timeout_secs == 0 {
            return Err(BassaError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::Backoff;
    use std::io::Write;

    #[test]
    fn defaults_match_the_server_conventions() {
        let config = ClientConfig::new("http://localhost:5000");
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.server_key, "123456789");
        assert_eq!(config.retry.policy().unwrap(), RetryPolicy::per_call(1));
    }

    #[test]
    fn transport_mode_builds_exponential_policy() {
        let retry = RetryConfig {
            total: 3,
            backoff_factor_secs: 0.5,
            mode: RetryMode::Transport,
        };
        let policy = retry.policy().unwrap();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff().delay(2), Duration::from_secs(1));
        assert!(matches!(policy.backoff(), Backoff::Exponential { .. }));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = ClientConfig::new("http://localhost:5000");
        assert!(config.validate().is_ok());
        config.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(BassaError::Config(_))));
    }

    #[test]
    fn negative_backoff_factor_is_rejected() {
        let retry = RetryConfig {
            total: 1,
            backoff_factor_secs: -1.0,
            mode: RetryMode::Transport,
        };
        assert!(matches!(retry.policy(), Err(BassaError::Config(_))));
    }

    #[test]
    fn deserializes_partial_json() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"api_url":"http://localhost:5000","retry":{"mode":"transport","total":2}}"#,
        )
        .unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.retry.total, 2);
        assert_eq!(config.retry.mode, RetryMode::Transport);
        assert_eq!(config.retry.backoff_factor_secs, 1.0);
    }

    // Environment variables are process-global, so the file and override
    // cases share one test.
    #[test]
    fn load_reads_file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "api_url = \"http://localhost:5000\"\ntimeout_secs = 9\n\n[retry]\ntotal = 4\nmode = \"transport\""
        )
        .unwrap();

        let config = ClientConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.api_url, "http://localhost:5000");
        assert_eq!(config.timeout_secs, 9);
        assert_eq!(config.retry.total, 4);
        assert_eq!(config.retry.mode, RetryMode::Transport);

        std::env::set_var("BASSA_TIMEOUT_SECS", "2");
        std::env::set_var("BASSA_RETRY__TOTAL", "7");
        let config = ClientConfig::load(Some(file.path()));
        std::env::remove_var("BASSA_TIMEOUT_SECS");
        std::env::remove_var("BASSA_RETRY__TOTAL");
        let config = config.unwrap();
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.retry.total, 7);
        assert_eq!(config.retry.mode, RetryMode::Transport);

        std::env::set_var("BASSA_TIMEOUT_SECS", "0");
        let config = ClientConfig::load(Some(file.path()));
        std::env::remove_var("BASSA_TIMEOUT_SECS");
        assert!(matches!(config, Err(BassaError::Config(_))));
    }
}
