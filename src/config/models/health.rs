//! Health check configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Periodic TCP health check settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Run the health checker
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between check cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// TCP connect timeout per probe in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_interval_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl HealthCheckConfig {
    /// Interval between cycles
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Per-probe connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_connect_timeout_ms() -> u64 {
    3000
}
