//! # Commerce API Configuration Module
//!
//! This module defines configuration structures for talking to the SMM panel,
//! including recovery settings and request timeouts.

use std::time::Duration;

// Constants for Commerce API configuration
pub const DEFAULT_API_URL: &str = "https://trendifysmm.com/api/v2";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Recovery configuration for error handling
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts for idempotent reads
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,  // 0.5 seconds
            max_retry_delay_ms: 4000,  // 4 seconds
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

impl RecoveryConfig {
    /// Backoff before retry number `attempt` (0-based), without jitter.
    ///
    /// Doubles from `base_retry_delay_ms` and is capped at `max_retry_delay_ms`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
        let delay = self
            .base_retry_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Configuration structure for the Commerce API client
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Base endpoint every action is sent to
    pub api_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Recovery and error handling configuration
    pub recovery: RecoveryConfig,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            recovery: RecoveryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RecoveryConfig::default();
        assert_eq!(config.backoff_delay(0), Duration::from_millis(500));
        assert_eq!(config.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(config.backoff_delay(10), Duration::from_millis(4000));
        assert_eq!(config.backoff_delay(u32::MAX), Duration::from_millis(4000));
    }
}
