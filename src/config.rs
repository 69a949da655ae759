//! Engine configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ErrorCode;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_SETTLE_MS: u64 = 300;
pub const DEFAULT_PARSE_RETRY_MS: u64 = 50;
pub const DEFAULT_PARSE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidValue { .. } => "E_CONFIG_INVALID",
        }
    }
}

/// Timing and history knobs for one editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet period after the last canvas edit before staging text.
    pub debounce: Duration,
    /// Delay after a canvas render before the session reports ready.
    pub settle: Duration,
    /// Backoff between attempts to acquire the parser guard.
    pub parse_retry: Duration,
    /// How long a caller waits on the layout collaborator. The call itself
    /// keeps running, and keeps the parser guard, until it returns.
    pub parse_timeout: Duration,
    /// Maximum retained history entries. `None` keeps everything.
    pub history_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            parse_retry: Duration::from_millis(DEFAULT_PARSE_RETRY_MS),
            parse_timeout: Duration::from_millis(DEFAULT_PARSE_TIMEOUT_MS),
            history_limit: None,
        }
    }
}

impl EngineConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `FLOWSYNC_DEBOUNCE_MS`: default 300
    /// - `FLOWSYNC_SETTLE_MS`: default 300
    /// - `FLOWSYNC_PARSE_RETRY_MS`: default 50
    /// - `FLOWSYNC_PARSE_TIMEOUT_MS`: default 10000
    /// - `FLOWSYNC_HISTORY_LIMIT`: unbounded when absent
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a variable is set but does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let history_limit = match std::env::var("FLOWSYNC_HISTORY_LIMIT") {
            Ok(raw) => Some(parse_value::<usize>("FLOWSYNC_HISTORY_LIMIT", &raw)?.max(1)),
            Err(_) => None,
        };

        Ok(Self {
            debounce: env_millis("FLOWSYNC_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?,
            settle: env_millis("FLOWSYNC_SETTLE_MS", DEFAULT_SETTLE_MS)?,
            parse_retry: env_millis("FLOWSYNC_PARSE_RETRY_MS", DEFAULT_PARSE_RETRY_MS)?,
            parse_timeout: env_millis("FLOWSYNC_PARSE_TIMEOUT_MS", DEFAULT_PARSE_TIMEOUT_MS)?,
            history_limit,
        })
    }
}

fn env_millis(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let millis = match std::env::var(key) {
        Ok(raw) => parse_value::<u64>(key, &raw)?,
        Err(_) => default,
    };
    Ok(Duration::from_millis(millis))
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue { key: key.to_owned(), value: raw.to_owned() })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
