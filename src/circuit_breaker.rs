//! # Circuit Breaker Module
//!
//! Stops calling the recommendation API for a while after repeated failures,
//! so a broken upstream does not hold every user's request for the full retry cycle.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Circuit breaker guarding an upstream service
///
/// # State Machine
///
/// - **Closed**: normal operation, requests pass through
/// - **Open**: failure threshold reached, requests fail fast
/// - **Half-Open**: reset timeout elapsed, the next request is let through
///
/// Uses `circuit_breaker_threshold` and `circuit_breaker_reset_secs` from
/// [`RecoveryConfig`].
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use calorizer::circuit_breaker::CircuitBreaker;
    /// use calorizer::config::RecoveryConfig;
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

    /// `true` while the threshold is reached and the reset timeout has not elapsed
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        if state.failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs) {
                    return true;
                }
                info!("Circuit breaker reset timeout elapsed, closing");
                *state = BreakerState::default();
            }
        }
        false
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
        if state.failure_count == self.config.circuit_breaker_threshold {
            warn!(failures = state.failure_count, "Circuit breaker opened");
        }
    }

    /// Record a successful call, closing the circuit
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        *state = BreakerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, reset_secs: u64) -> RecoveryConfig {
        RecoveryConfig {
            circuit_breaker_threshold: threshold,
            circuit_breaker_reset_secs: reset_secs,
            ..RecoveryConfig::default()
        }
    }

    #[test]
    fn test_opens_at_threshold_and_closes_on_success() {
        let breaker = CircuitBreaker::new(config(2, 60));
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());

        breaker.record_success();
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_resets_after_timeout() {
        let breaker = CircuitBreaker::new(config(1, 0));
        breaker.record_failure();
        // A zero reset timeout has always elapsed
        assert!(!breaker.is_open());
    }
}
