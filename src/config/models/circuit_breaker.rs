//! Circuit breaker configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Circuit breaker configuration shared by all per-instance breakers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Enable circuit breaking
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Failure rate (0, 1] at or above which the breaker opens
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,
    /// Requests required in the window before the failure rate is considered
    #[serde(default = "default_minimum_request_threshold")]
    pub minimum_request_threshold: u64,
    /// Seconds an open breaker waits before allowing a trial call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Trial calls permitted while half-open
    #[serde(default = "default_half_open_max_calls")]
    pub half_open_max_calls: u32,
    /// Length of the rolling counter window in seconds (0 disables rolling)
    #[serde(default = "default_window_size_secs")]
    pub window_size_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_rate_threshold: default_failure_rate_threshold(),
            minimum_request_threshold: default_minimum_request_threshold(),
            timeout_secs: default_timeout_secs(),
            half_open_max_calls: default_half_open_max_calls(),
            window_size_secs: default_window_size_secs(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Cool-down before half-open
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rolling window length
    pub fn window_size(&self) -> Duration {
        Duration::from_secs(self.window_size_secs)
    }
}

fn default_failure_rate_threshold() -> f64 {
    0.5
}

fn default_minimum_request_threshold() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_half_open_max_calls() -> u32 {
    1
}

fn default_window_size_secs() -> u64 {
    60
}
