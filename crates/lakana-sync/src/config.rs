//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::flush::RetryPolicy;

/// Tunables of the [`SyncEngine`](crate::SyncEngine).
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How long a table read is served from the cache.
    pub cache_ttl_secs: u64,
    /// Interval of the background flush job.
    pub flush_interval_secs: u64,
    /// Failed flushes after which a queued item is dropped. `None` retries forever.
    pub max_flush_attempts: Option<u32>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            flush_interval_secs: 60,
            max_flush_attempts: Some(30),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_flush_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: SyncConfig = serde_json::from_str(r#"{ "cache_ttl_secs": 5 }"#).unwrap();
        assert_eq!(
            config,
            SyncConfig {
                cache_ttl_secs: 5,
                ..SyncConfig::default()
            }
        );
    }

    #[test]
    fn test_null_means_unlimited_retries() {
        let config: SyncConfig =
            serde_json::from_str(r#"{ "max_flush_attempts": null }"#).unwrap();
        assert_eq!(config.retry_policy().max_attempts, None);
        assert_eq!(config.flush_interval(), Duration::from_secs(60));
    }
}
