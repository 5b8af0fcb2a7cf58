//! Backend instance configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// One backend endpoint of a logical service.
///
/// Identity is the derived [`instance_key`](ModelInstance::instance_key)
/// (`base_url + path`), not the name: two entries pointing at the same
/// endpoint are the same instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInstance {
    /// Model name served by this instance
    pub name: String,
    /// Base URL, e.g. `http://10.0.0.5:8080`
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    /// Request path appended to the base URL
    #[serde(default)]
    pub path: String,
    /// Relative selection weight
    #[serde(default = "default_weight")]
    pub weight: u32,
    /// Optional per-instance rate limit
    #[serde(default, alias = "rateLimit", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
}

impl ModelInstance {
    /// Create an instance with weight 1
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            path: path.into(),
            weight: default_weight(),
            rate_limit: None,
        }
    }

    /// Set the weight
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Attach a per-instance rate limit
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Stable identity of the instance
    pub fn instance_key(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    /// Weight used by the weighted strategies (never below 1)
    pub fn effective_weight(&self) -> u32 {
        self.weight.max(1)
    }
}

impl PartialEq for ModelInstance {
    fn eq(&self, other: &Self) -> bool {
        self.base_url == other.base_url && self.path == other.path
    }
}

impl Eq for ModelInstance {}

impl Hash for ModelInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base_url.hash(state);
        self.path.hash(state);
    }
}
