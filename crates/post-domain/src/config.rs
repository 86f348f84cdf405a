//! Command handler configuration loaded from environment variables.

use std::time::Duration;

/// Retry policy for commands that lose an optimistic-concurrency race.
///
/// Reads from environment variables:
/// - `POST_MAX_CONFLICT_RETRIES`: reload-and-retry attempts after a
///   version conflict (default: `0`, conflicts are returned to the caller)
/// - `POST_RETRY_BACKOFF_MS`: pause before each retry (default: `0`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub max_conflict_retries: u32,
    pub retry_backoff: Duration,
}

impl HandlerConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_conflict_retries: lookup("POST_MAX_CONFLICT_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_conflict_retries),
            retry_backoff: lookup("POST_RETRY_BACKOFF_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),
        }
    }

    /// Returns a config that retries conflicts up to `retries` times.
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_conflict_retries: retries,
            ..Self::default()
        }
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 0,
            retry_backoff: Duration::ZERO,
        }
    }
}
