//! Load balancing configuration

use serde::{Deserialize, Serialize};

/// Per-service load balancing configuration.
///
/// The strategy is kept as a string so that an unknown name parses and is
/// resolved to the default by the component factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalanceConfig {
    /// Strategy: `random`, `round-robin`, `least-connections` or `ip-hash`
    #[serde(rename = "type", default = "default_load_balance_type")]
    pub lb_type: String,
    /// Digest used by `ip-hash`
    #[serde(default = "default_hash_algorithm", alias = "hashAlgorithm")]
    pub hash_algorithm: String,
}

impl Default for LoadBalanceConfig {
    fn default() -> Self {
        Self {
            lb_type: default_load_balance_type(),
            hash_algorithm: default_hash_algorithm(),
        }
    }
}

impl LoadBalanceConfig {
    /// Configuration for the given strategy name with the default digest
    pub fn with_type(lb_type: impl Into<String>) -> Self {
        Self {
            lb_type: lb_type.into(),
            ..Self::default()
        }
    }
}

fn default_load_balance_type() -> String {
    "random".to_string()
}

fn default_hash_algorithm() -> String {
    "md5".to_string()
}
