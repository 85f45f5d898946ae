//! # Circuit Breaker Module
//!
//! This module implements the circuit breaker pattern for SMM panel calls.
//! It stops hammering the panel when requests fail repeatedly and lets the
//! bot answer users immediately instead of waiting on timeouts.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::commerce_config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Circuit breaker for Commerce API operations
///
/// # State Machine
///
/// - **Closed**: Normal operation, requests pass through
/// - **Open**: Failure threshold exceeded, requests fail fast
/// - **Half-Open**: Reset timeout elapsed, the next request is let through
///
/// # Configuration
///
/// Uses `RecoveryConfig` for:
/// - `circuit_breaker_threshold`: Failures before opening (default: 5)
/// - `circuit_breaker_reset_secs`: Time before attempting reset (default: 60s)
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// ```rust
    /// use smm_order_bot::commerce_config::RecoveryConfig;
    /// use smm_order_bot::circuit_breaker::CircuitBreaker;
    ///
    /// let breaker = CircuitBreaker::new(RecoveryConfig::default());
    /// assert!(!breaker.is_open());
    /// ```
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    /// Check if circuit breaker is open (blocking requests)
    ///
    /// Returns `true` when failure count >= threshold and the reset time hasn't
    /// elapsed. Once it has, the counters are cleared and requests flow again.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs) {
                    return true;
                }
                *state = BreakerState::default();
            }
        }
        false
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
    }

    /// Record a successful call, closing the circuit
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = BreakerState::default();
    }
}
