//! Validation implementations for the configuration models

use super::trait_def::Validate;
use crate::config::models::*;
use crate::core::load_balancer::LoadBalanceStrategy;
use crate::core::rate_limiter::{MAX_SLIDING_WINDOW_RATE, RateLimitAlgorithm, RateLimitScope};
use tracing::{debug, warn};

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<(), String> {
        debug!("Validating router configuration");

        self.load_balance
            .validate()
            .map_err(|e| format!("load_balance: {}", e))?;
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit
                .validate()
                .map_err(|e| format!("rate_limit: {}", e))?;
        }
        self.circuit_breaker
            .validate()
            .map_err(|e| format!("circuit_breaker: {}", e))?;
        if let Some(fallback) = &self.fallback {
            fallback.validate().map_err(|e| format!("fallback: {}", e))?;
        }
        self.health_check
            .validate()
            .map_err(|e| format!("health_check: {}", e))?;
        self.rate_limit_cleanup
            .validate()
            .map_err(|e| format!("rate_limit_cleanup: {}", e))?;

        for (service, config) in &self.services {
            config
                .validate()
                .map_err(|e| format!("services.{}: {}", service, e))?;
        }

        Ok(())
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<(), String> {
        for instance in &self.instances {
            instance.validate()?;
        }
        if let Some(load_balance) = &self.load_balance {
            load_balance.validate()?;
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        if let Some(fallback) = &self.fallback {
            fallback.validate()?;
        }
        Ok(())
    }
}

impl Validate for ModelInstance {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Instance name cannot be empty".to_string());
        }

        if self.base_url.trim().is_empty() {
            return Err(format!("Instance '{}' has an empty base URL", self.name));
        }

        if self.weight == 0 {
            return Err(format!("Instance '{}' weight must be at least 1", self.name));
        }

        if let Some(rate_limit) = &self.rate_limit {
            rate_limit
                .validate()
                .map_err(|e| format!("Instance '{}' rate limit: {}", self.name, e))?;
        }

        Ok(())
    }
}

impl Validate for LoadBalanceConfig {
    fn validate(&self) -> Result<(), String> {
        if LoadBalanceStrategy::from_name(&self.lb_type).is_none() {
            warn!(
                "Unknown load balance type '{}', the random strategy will be used",
                self.lb_type
            );
        }
        Ok(())
    }
}

impl Validate for RateLimitConfig {
    fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }

        if self.capacity == 0 {
            return Err("Rate limit capacity must be greater than 0".to_string());
        }

        if self.rate == 0 {
            return Err("Rate limit rate must be greater than 0".to_string());
        }

        let algorithm = RateLimitAlgorithm::from_name(&self.algorithm);
        if algorithm.is_none() {
            warn!(
                "Unknown rate limit algorithm '{}', the token bucket will be used",
                self.algorithm
            );
        }

        if algorithm == Some(RateLimitAlgorithm::SlidingWindow)
            && self.rate > MAX_SLIDING_WINDOW_RATE
        {
            return Err(format!(
                "Sliding window rate must be at most {}, got {}",
                MAX_SLIDING_WINDOW_RATE, self.rate
            ));
        }

        if algorithm == Some(RateLimitAlgorithm::WarmUp) && self.warm_up_period == 0 {
            return Err("Warm-up rate limit requires a warm_up_period greater than 0".to_string());
        }

        if RateLimitScope::from_name(&self.scope).is_none() {
            return Err(format!(
                "Invalid rate limit scope '{}', expected global, service, client-ip or per-client-ip",
                self.scope
            ));
        }

        Ok(())
    }
}

impl Validate for CircuitBreakerConfig {
    fn validate(&self) -> Result<(), String> {
        if !(self.failure_rate_threshold > 0.0 && self.failure_rate_threshold <= 1.0) {
            return Err(format!(
                "Circuit breaker failure rate threshold must be in (0, 1], got {}",
                self.failure_rate_threshold
            ));
        }

        if self.minimum_request_threshold == 0 {
            return Err("Circuit breaker minimum request threshold must be greater than 0".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Circuit breaker timeout must be greater than 0".to_string());
        }

        if self.half_open_max_calls == 0 {
            return Err("Circuit breaker half-open max calls must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for FallbackConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.strategy.eq_ignore_ascii_case("cache") && self.cache_size == 0 {
            return Err("Fallback cache size must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Validate for HealthCheckConfig {
    fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("Health check interval must be greater than 0".to_string());
        }

        if self.connect_timeout_ms == 0 {
            return Err("Health check connect timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for RateLimitCleanupConfig {
    fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("Rate limit cleanup interval must be greater than 0".to_string());
        }
        if self.enabled && self.idle_timeout_secs == 0 {
            return Err("Rate limit cleanup idle timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}
