//! Component factory
//!
//! Maps configuration tags to concrete strategies. The `create_*` methods
//! never fail: an unknown tag is logged and replaced by the documented default
//! (random balancer, token bucket limiter, default fallback). The `try_create_*`
//! and `validate_*` methods are strict and back administrative updates, where a
//! bad configuration must be rejected rather than silently defaulted.

use crate::config::{
    CircuitBreakerConfig, FallbackConfig, LoadBalanceConfig, RateLimitConfig, Validate,
};
use crate::core::circuit_breaker::CircuitBreaker;
use crate::core::fallback::{
    CacheFallbackStrategy, DefaultFallbackStrategy, FallbackStrategy, FallbackStrategyKind,
};
use crate::core::load_balancer::{
    IpHashLoadBalancer, LeastConnectionsLoadBalancer, LoadBalanceStrategy, LoadBalancer,
    RandomLoadBalancer, RoundRobinLoadBalancer,
};
use crate::core::observability::{SharedObserver, noop_observer};
use crate::core::rate_limiter::{
    LeakyBucketRateLimiter, RateLimitAlgorithm, RateLimitScope, RateLimiter, ScopedRateLimiter,
    SlidingWindowRateLimiter, TokenBucketRateLimiter, WarmUpRateLimiter,
};
use crate::utils::error::{GatewayError, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds load balancers, rate limiters, circuit breakers and fallback
/// strategies from configuration
pub struct ComponentFactory {
    observer: SharedObserver,
}

impl Default for ComponentFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentFactory {
    /// Factory whose circuit breakers report nowhere
    pub fn new() -> Self {
        Self::with_observer(noop_observer())
    }

    /// Factory whose circuit breakers report to `observer`
    pub fn with_observer(observer: SharedObserver) -> Self {
        Self { observer }
    }

    /// Observer handed to created components
    pub fn observer(&self) -> SharedObserver {
        Arc::clone(&self.observer)
    }

    // ==================== Load balancers ====================

    /// Build a load balancer, defaulting to random on an unknown type
    pub fn create_load_balancer(&self, config: &LoadBalanceConfig) -> Arc<dyn LoadBalancer> {
        let strategy = LoadBalanceStrategy::from_name(&config.lb_type).unwrap_or_else(|| {
            warn!(
                "Unknown load balance type '{}', using random",
                config.lb_type
            );
            LoadBalanceStrategy::Random
        });
        self.build_load_balancer(strategy, config)
    }

    /// Build a load balancer, rejecting an unknown type
    pub fn try_create_load_balancer(&self, config: &LoadBalanceConfig) -> Result<Arc<dyn LoadBalancer>> {
        self.validate_load_balance_config(config)?;
        let strategy = LoadBalanceStrategy::from_name(&config.lb_type).ok_or_else(|| {
            GatewayError::Validation(format!("Unknown load balance type: {}", config.lb_type))
        })?;
        Ok(self.build_load_balancer(strategy, config))
    }

    fn build_load_balancer(
        &self,
        strategy: LoadBalanceStrategy,
        config: &LoadBalanceConfig,
    ) -> Arc<dyn LoadBalancer> {
        debug!("Creating {} load balancer", strategy);
        match strategy {
            LoadBalanceStrategy::Random => Arc::new(RandomLoadBalancer::new()),
            LoadBalanceStrategy::RoundRobin => Arc::new(RoundRobinLoadBalancer::new()),
            LoadBalanceStrategy::LeastConnections => Arc::new(LeastConnectionsLoadBalancer::new()),
            LoadBalanceStrategy::IpHash => Arc::new(IpHashLoadBalancer::new(&config.hash_algorithm)),
        }
    }

    // ==================== Rate limiters ====================

    /// Build an unscoped limiter, defaulting to token bucket on an unknown
    /// algorithm
    pub fn create_rate_limiter(&self, config: &RateLimitConfig) -> Arc<dyn RateLimiter> {
        let algorithm = RateLimitAlgorithm::from_name(&config.algorithm).unwrap_or_else(|| {
            warn!(
                "Unknown rate limit algorithm '{}', using token-bucket",
                config.algorithm
            );
            RateLimitAlgorithm::TokenBucket
        });
        build_rate_limiter(algorithm, config)
    }

    /// Build a scope-aware limiter; an unknown scope is treated as global
    pub fn create_scoped_rate_limiter(&self, config: &RateLimitConfig) -> Arc<ScopedRateLimiter> {
        let algorithm = RateLimitAlgorithm::from_name(&config.algorithm).unwrap_or_else(|| {
            warn!(
                "Unknown rate limit algorithm '{}', using token-bucket",
                config.algorithm
            );
            RateLimitAlgorithm::TokenBucket
        });
        let scope = RateLimitScope::from_name(&config.scope).unwrap_or_else(|| {
            warn!("Unknown rate limit scope '{}', using global", config.scope);
            RateLimitScope::Global
        });

        let builder_config = config.clone();
        Arc::new(ScopedRateLimiter::new(
            config.clone(),
            scope,
            Arc::new(move || build_rate_limiter(algorithm, &builder_config)),
        ))
    }

    /// Build a scope-aware limiter, rejecting an invalid configuration
    pub fn try_create_scoped_rate_limiter(&self, config: &RateLimitConfig) -> Result<Arc<ScopedRateLimiter>> {
        self.validate_rate_limit_config(config)?;
        if RateLimitAlgorithm::from_name(&config.algorithm).is_none() {
            return Err(GatewayError::Validation(format!(
                "Unknown rate limit algorithm: {}",
                config.algorithm
            )));
        }
        Ok(self.create_scoped_rate_limiter(config))
    }

    // ==================== Circuit breakers ====================

    /// Build a closed circuit breaker
    pub fn create_circuit_breaker(&self, name: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::with_observer(
            name,
            config.clone(),
            Arc::clone(&self.observer),
        ))
    }

    // ==================== Fallback ====================

    /// Build a fallback strategy, defaulting to the fixed payload on an
    /// unknown name
    pub fn create_fallback_strategy(&self, config: &FallbackConfig) -> Arc<dyn FallbackStrategy> {
        let kind = FallbackStrategyKind::from_name(&config.strategy).unwrap_or_else(|| {
            warn!(
                "Unknown fallback strategy '{}', using default",
                config.strategy
            );
            FallbackStrategyKind::Default
        });
        match kind {
            FallbackStrategyKind::Default => Arc::new(DefaultFallbackStrategy),
            FallbackStrategyKind::Cache => Arc::new(CacheFallbackStrategy::new(config.cache_size)),
        }
    }

    // ==================== Validation ====================

    /// Strictly validate a load balancing configuration
    pub fn validate_load_balance_config(&self, config: &LoadBalanceConfig) -> Result<()> {
        if LoadBalanceStrategy::from_name(&config.lb_type).is_none() {
            return Err(GatewayError::Validation(format!(
                "Unknown load balance type: {}",
                config.lb_type
            )));
        }
        Ok(())
    }

    /// Validate a rate limiting configuration
    pub fn validate_rate_limit_config(&self, config: &RateLimitConfig) -> Result<()> {
        config.validate().map_err(GatewayError::Validation)
    }

    /// Validate a circuit breaker configuration
    pub fn validate_circuit_breaker_config(&self, config: &CircuitBreakerConfig) -> Result<()> {
        config.validate().map_err(GatewayError::Validation)
    }

    /// Strictly validate a fallback configuration
    pub fn validate_fallback_config(&self, config: &FallbackConfig) -> Result<()> {
        if FallbackStrategyKind::from_name(&config.strategy).is_none() {
            return Err(GatewayError::Validation(format!(
                "Unknown fallback strategy: {}",
                config.strategy
            )));
        }
        config.validate().map_err(GatewayError::Validation)
    }
}

fn build_rate_limiter(algorithm: RateLimitAlgorithm, config: &RateLimitConfig) -> Arc<dyn RateLimiter> {
    match algorithm {
        RateLimitAlgorithm::TokenBucket => Arc::new(TokenBucketRateLimiter::new(config.clone())),
        RateLimitAlgorithm::LeakyBucket => Arc::new(LeakyBucketRateLimiter::new(config.clone())),
        RateLimitAlgorithm::SlidingWindow => Arc::new(SlidingWindowRateLimiter::new(config.clone())),
        RateLimitAlgorithm::WarmUp => Arc::new(WarmUpRateLimiter::new(config.clone())),
    }
}

impl std::fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentFactory").finish_non_exhaustive()
    }
}
