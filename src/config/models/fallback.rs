//! Fallback configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Fallback (degradation) configuration for a service or the whole gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Enable fallback responses
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Strategy: `default` or `cache`
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Maximum cached responses kept by the `cache` strategy
    #[serde(default = "default_cache_size", alias = "cacheSize")]
    pub cache_size: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: default_strategy(),
            cache_size: default_cache_size(),
        }
    }
}

impl FallbackConfig {
    /// Enabled configuration for the given strategy name
    pub fn with_strategy(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            ..Self::default()
        }
    }
}

fn default_strategy() -> String {
    "default".to_string()
}

fn default_cache_size() -> usize {
    100
}
