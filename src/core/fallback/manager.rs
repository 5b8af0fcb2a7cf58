//! Per-service fallback strategy resolution

use super::cache::CacheKey;
use super::strategy::{FallbackResponse, FallbackStrategy};
use crate::config::{FallbackConfig, ServiceType};
use crate::core::factory::ComponentFactory;
use crate::utils::error::GatewayError;
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Resolves and caches one fallback strategy per service.
///
/// A service's own fallback configuration wins over the global one. Errors
/// and panics raised by a strategy never cross this boundary: they are
/// logged and reported as "no fallback available".
pub struct FallbackManager {
    factory: Arc<ComponentFactory>,
    global: ArcSwapOption<FallbackConfig>,
    pub(super) strategies: DashMap<ServiceType, Arc<dyn FallbackStrategy>>,
}

impl FallbackManager {
    /// Create a manager with an optional global configuration
    pub fn new(factory: Arc<ComponentFactory>, global: Option<FallbackConfig>) -> Self {
        Self {
            factory,
            global: ArcSwapOption::from(global.map(Arc::new)),
            strategies: DashMap::new(),
        }
    }

    /// Strategy for `service`, created and cached on first use.
    ///
    /// Returns `None` when neither the service nor the global configuration
    /// enables a fallback.
    pub fn get_fallback_strategy(
        &self,
        service: ServiceType,
        service_config: Option<&FallbackConfig>,
    ) -> Option<Arc<dyn FallbackStrategy>> {
        if let Some(strategy) = self.strategies.get(&service) {
            return Some(Arc::clone(strategy.value()));
        }

        let global = self.global.load_full();
        let config = service_config.or(global.as_deref())?;
        if !config.enabled {
            return None;
        }

        let strategy = self
            .strategies
            .entry(service)
            .or_insert_with(|| {
                debug!("Creating {} fallback strategy for {}", config.strategy, service);
                self.factory.create_fallback_strategy(config)
            });
        Some(Arc::clone(strategy.value()))
    }

    /// Degraded response for `service` after `cause`, or `None` when no
    /// fallback is configured or the strategy failed
    pub fn fallback(
        &self,
        service: ServiceType,
        service_config: Option<&FallbackConfig>,
        cause: &GatewayError,
    ) -> Option<FallbackResponse> {
        let strategy = self.get_fallback_strategy(service, service_config)?;

        match catch_unwind(AssertUnwindSafe(|| strategy.fallback(service, cause))) {
            Ok(Ok(response)) => {
                debug!(
                    "Fallback for {} answered with status {} (cached: {})",
                    service, response.status, response.from_cache
                );
                Some(response)
            }
            Ok(Err(e)) => {
                warn!("Fallback strategy for {} failed: {}", service, e);
                None
            }
            Err(_) => {
                error!("Fallback strategy for {} panicked", service);
                None
            }
        }
    }

    /// Offer a successful response to the service's strategy for caching
    pub fn cache_response(
        &self,
        service: ServiceType,
        service_config: Option<&FallbackConfig>,
        key: CacheKey,
        response: Value,
    ) {
        let Some(strategy) = self.get_fallback_strategy(service, service_config) else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| strategy.cache_response(key, response))).is_err() {
            error!("Fallback strategy for {} panicked while caching", service);
        }
    }

    /// Forget the cached strategy of one service
    pub fn clear_fallback_strategy(&self, service: ServiceType) -> bool {
        let removed = self.strategies.remove(&service).is_some();
        if removed {
            info!("Cleared fallback strategy for {}", service);
        }
        removed
    }

    /// Forget every cached strategy
    pub fn clear_all(&self) {
        self.strategies.clear();
    }

    /// Replace the global configuration and drop cached strategies
    pub fn update_global_config(&self, global: Option<FallbackConfig>) {
        self.global.store(global.map(Arc::new));
        self.clear_all();
    }

    /// Number of cached strategies
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }
}

impl std::fmt::Debug for FallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackManager")
            .field("strategies", &self.strategies.len())
            .finish()
    }
}
