//! Top-level router configuration

use super::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Environment variable overriding the health check interval (seconds)
pub const ENV_HEALTH_CHECK_INTERVAL: &str = "MODELROUTER_HEALTH_CHECK_INTERVAL";
/// Environment variable overriding the default load balancing strategy
pub const ENV_LOAD_BALANCE_TYPE: &str = "MODELROUTER_LOAD_BALANCE_TYPE";
/// Environment variable enabling or disabling the health checker
pub const ENV_HEALTH_CHECK_ENABLED: &str = "MODELROUTER_HEALTH_CHECK_ENABLED";

/// Router configuration: global defaults plus per-service overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Default load balancing for services without an override
    #[serde(default, alias = "loadBalance")]
    pub load_balance: LoadBalanceConfig,
    /// Default rate limit for services without an override
    #[serde(default, alias = "rateLimit", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
    /// Circuit breaker settings for every instance
    #[serde(default, alias = "circuitBreaker")]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Default fallback for services without an override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackConfig>,
    /// Health checker settings
    #[serde(default, alias = "healthCheck")]
    pub health_check: HealthCheckConfig,
    /// Idle limiter cleanup settings
    #[serde(default, alias = "rateLimitCleanup")]
    pub rate_limit_cleanup: RateLimitCleanupConfig,
    /// Services keyed by type
    #[serde(default)]
    pub services: HashMap<ServiceType, ServiceConfig>,
}

impl GatewayConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> crate::utils::error::Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `MODELROUTER_*` environment overrides in place
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var(ENV_HEALTH_CHECK_INTERVAL) {
            match value.parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    debug!("Health check interval overridden from environment: {}s", secs);
                    self.health_check.interval_secs = secs;
                }
                _ => warn!(
                    "Ignoring invalid {} value: {}",
                    ENV_HEALTH_CHECK_INTERVAL, value
                ),
            }
        }

        if let Ok(value) = std::env::var(ENV_HEALTH_CHECK_ENABLED) {
            match value.parse::<bool>() {
                Ok(enabled) => self.health_check.enabled = enabled,
                Err(_) => warn!(
                    "Ignoring invalid {} value: {}",
                    ENV_HEALTH_CHECK_ENABLED, value
                ),
            }
        }

        if let Ok(value) = std::env::var(ENV_LOAD_BALANCE_TYPE) {
            if !value.trim().is_empty() {
                debug!("Default load balance type overridden from environment: {}", value);
                self.load_balance.lb_type = value;
            }
        }
    }

    /// Merge two configurations, with other taking precedence per service
    pub fn merge(mut self, other: Self) -> Self {
        self.load_balance = other.load_balance;
        if other.rate_limit.is_some() {
            self.rate_limit = other.rate_limit;
        }
        self.circuit_breaker = other.circuit_breaker;
        if other.fallback.is_some() {
            self.fallback = other.fallback;
        }
        self.health_check = other.health_check;
        self.rate_limit_cleanup = other.rate_limit_cleanup;
        self.services.extend(other.services);
        self
    }

    /// Service configuration, if the service is configured
    pub fn service(&self, service: ServiceType) -> Option<&ServiceConfig> {
        self.services.get(&service)
    }

    /// Effective load balancing for a service
    pub fn load_balance_for(&self, service: ServiceType) -> &LoadBalanceConfig {
        self.service(service)
            .and_then(|s| s.load_balance.as_ref())
            .unwrap_or(&self.load_balance)
    }

    /// Effective rate limit for a service
    pub fn rate_limit_for(&self, service: ServiceType) -> Option<&RateLimitConfig> {
        self.service(service)
            .and_then(|s| s.rate_limit.as_ref())
            .or(self.rate_limit.as_ref())
    }

    /// Effective fallback configuration for a service
    pub fn fallback_for(&self, service: ServiceType) -> Option<&FallbackConfig> {
        self.service(service)
            .and_then(|s| s.fallback.as_ref())
            .or(self.fallback.as_ref())
    }
}
