//! Rate limiting configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate limiting configuration for a service or an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Algorithm: `token-bucket`, `leaky-bucket`, `sliding-window` or `warm-up`
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Bucket capacity (burst size)
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    /// Tokens per second, or requests per window for the sliding window
    #[serde(default = "default_rate")]
    pub rate: u64,
    /// Scope: `global` / `service`, or `per-client-ip` / `client-ip`
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Warm-up period in seconds (warm-up algorithm only)
    #[serde(default, alias = "warmUpPeriod")]
    pub warm_up_period: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: default_algorithm(),
            capacity: default_capacity(),
            rate: default_rate(),
            scope: default_scope(),
            warm_up_period: 0,
        }
    }
}

impl RateLimitConfig {
    /// Enabled configuration for `algorithm` with the given capacity and rate
    pub fn new(algorithm: impl Into<String>, capacity: u64, rate: u64) -> Self {
        Self {
            algorithm: algorithm.into(),
            capacity,
            rate,
            ..Self::default()
        }
    }

    /// Set the scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Set the warm-up period in seconds
    pub fn with_warm_up_period(mut self, seconds: u64) -> Self {
        self.warm_up_period = seconds;
        self
    }
}

/// Idle per-client-IP limiter eviction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitCleanupConfig {
    /// Run the cleanup task
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeps
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Limiters untouched for this many seconds are evicted
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for RateLimitCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_cleanup_interval(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

impl RateLimitCleanupConfig {
    /// Time between sweeps
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Idle time after which a per-client limiter is evicted
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn default_algorithm() -> String {
    "token-bucket".to_string()
}

fn default_capacity() -> u64 {
    100
}

fn default_rate() -> u64 {
    10
}

fn default_scope() -> String {
    "service".to_string()
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_idle_timeout() -> u64 {
    1800
}
