//! Configuration for the request broker.

use std::time::Duration;

use crate::error::BrokerError;

/// Configuration for rate limiting, caching, batching and circuit breaking.
///
/// Immutable for the life of a broker instance.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Minimum interval between the starts of two backend calls.
    pub min_interval: Duration,

    /// Number of retries after the first attempt for rate-limited failures.
    pub max_retries: u32,

    /// Backoff before the first retry.
    pub initial_backoff: Duration,

    /// Upper bound on any single backoff sleep.
    pub max_backoff: Duration,

    /// Multiplier applied to the backoff after each retry.
    pub backoff_factor: f64,

    /// Time-to-live for cached responses.
    pub cache_ttl: Duration,

    /// Maximum number of queued requests drained per batch flush.
    pub max_batch_size: usize,

    /// Interval between batch flushes.
    pub batch_timeout: Duration,

    /// Consecutive quota failures that trip the circuit breaker.
    pub circuit_breaker_threshold: u32,

    /// How long the circuit stays open before calls resume.
    pub circuit_breaker_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(20),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(32),
            backoff_factor: 2.0,
            cache_ttl: Duration::from_secs(3600),
            max_batch_size: 8,
            batch_timeout: Duration::from_secs(5),
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    /// Config for backends with generous rate limits (interactive use).
    pub fn low_latency() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            batch_timeout: Duration::from_secs(1),
            ..Self::default()
        }
    }

    /// Config for tightly rationed backends. Longer pacing, longer cooldown.
    pub fn conservative() -> Self {
        Self {
            min_interval: Duration::from_secs(60),
            max_retries: 5,
            max_backoff: Duration::from_secs(120),
            cache_ttl: Duration::from_secs(7200),
            circuit_breaker_threshold: 2,
            circuit_breaker_timeout: Duration::from_secs(900),
            ..Self::default()
        }
    }

    /// Check the config invariants. Called by the broker at construction.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.max_backoff < self.initial_backoff {
            return Err(BrokerError::InvalidConfig(format!(
                "max_backoff ({:?}) must be >= initial_backoff ({:?})",
                self.max_backoff, self.initial_backoff
            )));
        }
        if self.backoff_factor < 1.0 {
            return Err(BrokerError::InvalidConfig(format!(
                "backoff_factor ({}) must be >= 1.0",
                self.backoff_factor
            )));
        }
        if self.max_batch_size == 0 {
            return Err(BrokerError::InvalidConfig(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(BrokerError::InvalidConfig(
                "circuit_breaker_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RateLimitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_interval, Duration::from_secs(20));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(RateLimitConfig::low_latency().validate().is_ok());
        assert!(RateLimitConfig::conservative().validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_backoff_bounds() {
        let config = RateLimitConfig {
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(1),
            ..RateLimitConfig::default()
        };
        assert!(matches!(config.validate(), Err(BrokerError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_shrinking_backoff_factor() {
        let config = RateLimitConfig { backoff_factor: 0.5, ..RateLimitConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_batch() {
        let config = RateLimitConfig { max_batch_size: 0, ..RateLimitConfig::default() };
        assert!(config.validate().is_err());
    }
}
