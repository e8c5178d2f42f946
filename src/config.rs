//! Configuration Module
//!
//! Handles building cache configuration, either in code or from environment variables.

use std::env;
use std::time::Duration;

/// Default TTL applied by `set` when no explicit TTL is given
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default interval between background expiration sweeps
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Cache configuration parameters.
///
/// Built with chained setters:
///
/// ```
/// use std::time::Duration;
/// use mini_cache::Config;
///
/// let config = Config::new()
///     .ttl(Duration::from_secs(30))
///     .cleanup_interval(Duration::from_secs(5))
///     .enable_metrics();
/// assert!(config.enable_metrics);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Default TTL for `set`, `Duration::ZERO` = entries never expire
    pub ttl: Duration,
    /// Background cleanup interval, `Duration::ZERO` = no background cleanup
    pub cleanup_interval: Duration,
    /// Count insertions, hits, misses and evictions
    pub enable_metrics: bool,
    /// Emit a debug trace line for every cache operation
    pub debug: bool,
}

impl Config {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default TTL for entries stored without an explicit one.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets how often expired entries are purged in the background.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Selects the counting metrics sink instead of the no-op one.
    pub fn enable_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Turns on per-operation debug tracing.
    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_MS` - Default TTL in milliseconds, 0 disables expiration (default: 300000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Cleanup frequency in milliseconds, 0 disables it (default: 60000)
    /// - `CACHE_ENABLE_METRICS` - `true`/`false` (default: false)
    /// - `CACHE_DEBUG` - `true`/`false` (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            ttl: env::var("CACHE_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.ttl),
            cleanup_interval: env::var("CACHE_CLEANUP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.cleanup_interval),
            enable_metrics: env::var("CACHE_ENABLE_METRICS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enable_metrics),
            debug: env::var("CACHE_DEBUG")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.debug),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            enable_metrics: false,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
        assert!(!config.enable_metrics);
        assert!(!config.debug);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::new()
            .ttl(Duration::from_secs(60))
            .cleanup_interval(Duration::ZERO)
            .enable_metrics()
            .debug();

        assert_eq!(config.ttl, Duration::from_secs(60));
        assert_eq!(config.cleanup_interval, Duration::ZERO);
        assert!(config.enable_metrics);
        assert!(config.debug);
    }

    #[test]
    fn test_config_from_env() {
        // Only this test touches these variables
        env::set_var("CACHE_TTL_MS", "1500");
        env::set_var("CACHE_CLEANUP_INTERVAL_MS", "0");
        env::set_var("CACHE_ENABLE_METRICS", "true");
        env::set_var("CACHE_DEBUG", "not-a-bool");

        let config = Config::from_env();
        assert_eq!(config.ttl, Duration::from_millis(1500));
        assert_eq!(config.cleanup_interval, Duration::ZERO);
        assert!(config.enable_metrics);
        assert!(!config.debug);

        env::remove_var("CACHE_TTL_MS");
        env::remove_var("CACHE_CLEANUP_INTERVAL_MS");
        env::remove_var("CACHE_ENABLE_METRICS");
        env::remove_var("CACHE_DEBUG");

        assert_eq!(Config::from_env(), Config::default());
    }
}
