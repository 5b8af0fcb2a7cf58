//! Traffic manager
//!
//! The composition root. It owns the registry, health state, per-service
//! managers, circuit breakers and background tasks, and runs the routing
//! pipeline for every request:
//!
//! 1. candidates of the service, filtered by model name
//! 2. drop instances marked unhealthy
//! 3. drop instances whose circuit breaker is open
//! 4. service-level rate limit
//! 5. load balancer selection, then the instance rate limit and the breaker
//!    trial permit; a refused pick is removed and selection retried
//!
//! Call outcomes come back through [`TrafficManager::record_success`] and
//! [`TrafficManager::record_failure`].

use crate::config::{GatewayConfig, LoadBalanceConfig, ModelInstance, ServiceType, Validate};
use crate::core::circuit_breaker::{CircuitBreakerManager, CircuitState};
use crate::core::factory::ComponentFactory;
use crate::core::fallback::{CacheKey, FallbackManager, FallbackResponse};
use crate::core::health::{HealthChecker, HealthProbe, HealthSnapshot, ServiceStateManager};
use crate::core::load_balancer::LoadBalanceStrategy;
use crate::core::manager::{LoadBalancerManager, RateLimiterCleanup, RateLimiterManager, RateLimiterStatus};
use crate::core::observability::{SharedObserver, noop_observer, notify};
use crate::core::rate_limiter::RateLimitContext;
use crate::core::registry::ModelServiceRegistry;
use crate::utils::error::{GatewayError, Result};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Picks refused by an instance limit or breaker before giving up
const MAX_SELECTION_ATTEMPTS: usize = 3;

/// Outcome of a successful routing decision
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Service routed
    pub service: ServiceType,
    /// Instance that should receive the call
    pub instance: ModelInstance,
    /// Strategy that picked it
    pub strategy: LoadBalanceStrategy,
}

/// Owns every traffic management component
pub struct TrafficManager {
    config: ArcSwap<GatewayConfig>,
    observer: SharedObserver,
    registry: Arc<ModelServiceRegistry>,
    state: Arc<ServiceStateManager>,
    load_balancers: LoadBalancerManager,
    rate_limiters: Arc<RateLimiterManager>,
    circuit_breakers: Arc<CircuitBreakerManager>,
    fallback: FallbackManager,
    health_checker: Arc<HealthChecker>,
    cleanup: Arc<RateLimiterCleanup>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    reload_lock: Mutex<()>,
}

impl TrafficManager {
    /// Build every component from a validated configuration
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Self::with_observer(config, noop_observer())
    }

    /// Build every component, reporting events to `observer`
    pub fn with_observer(config: GatewayConfig, observer: SharedObserver) -> Result<Self> {
        config.validate().map_err(GatewayError::Config)?;

        let factory = Arc::new(ComponentFactory::with_observer(Arc::clone(&observer)));
        let registry = Arc::new(ModelServiceRegistry::from_config(&config));
        let state = Arc::new(ServiceStateManager::new());

        let load_balancers = LoadBalancerManager::new(Arc::clone(&factory));
        load_balancers.initialize(&config);

        let rate_limiters = Arc::new(RateLimiterManager::new(Arc::clone(&factory)));
        rate_limiters.initialize(&config);

        let circuit_breakers = Arc::new(CircuitBreakerManager::with_observer(
            config.circuit_breaker.clone(),
            Arc::clone(&observer),
        ));
        let fallback = FallbackManager::new(Arc::clone(&factory), config.fallback.clone());

        let health_checker = Arc::new(
            HealthChecker::new(
                Arc::clone(&registry),
                Arc::clone(&state),
                config.health_check.clone(),
            )
            .with_observer(Arc::clone(&observer)),
        );
        let cleanup = Arc::new(RateLimiterCleanup::new(
            Arc::clone(&rate_limiters),
            config.rate_limit_cleanup.clone(),
        ));

        info!(
            "Traffic manager ready: {} services, default load balancer {}",
            registry.service_types().len(),
            load_balancers.default_strategy()
        );

        Ok(Self {
            config: ArcSwap::from_pointee(config),
            observer,
            registry,
            state,
            load_balancers,
            rate_limiters,
            circuit_breakers,
            fallback,
            health_checker,
            cleanup,
            tasks: Mutex::new(Vec::new()),
            reload_lock: Mutex::new(()),
        })
    }

    /// Replace the health probe. Must be called before [`start`](Self::start).
    pub fn with_health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.health_checker = Arc::new(
            HealthChecker::new(
                Arc::clone(&self.registry),
                Arc::clone(&self.state),
                self.config.load().health_check.clone(),
            )
            .with_probe(probe)
            .with_observer(Arc::clone(&self.observer)),
        );
        self
    }

    // ==================== Lifecycle ====================

    /// Spawn the health checker and the idle limiter cleanup.
    ///
    /// Both loops live until shutdown and skip their cycles while disabled,
    /// so a reload can switch either one on or off. Must be called from
    /// within a tokio runtime. Calling it again while
    /// the tasks run has no effect.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            warn!("Traffic manager background tasks already running");
            return;
        }

        let config = self.config.load();
        if !config.health_check.enabled {
            info!("Health checking disabled until a reload enables it");
        }
        if !config.rate_limit_cleanup.enabled {
            info!("Rate limiter cleanup disabled until a reload enables it");
        }
        tasks.push(Arc::clone(&self.health_checker).start());
        tasks.push(Arc::clone(&self.cleanup).start());
        info!("Started {} background tasks", tasks.len());
    }

    /// Stop every background task
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock();
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("Traffic manager background tasks stopped");
    }

    /// Whether background tasks are running
    pub fn is_running(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    // ==================== Routing ====================

    /// Choose the instance of `service` that should receive a call.
    ///
    /// `model` narrows the candidates to instances of that name; `client_ip`
    /// feeds IP hashing and per-client rate limits.
    pub fn select_instance(
        &self,
        service: ServiceType,
        model: Option<&str>,
        client_ip: Option<&str>,
    ) -> Result<Selection> {
        let candidates = self.registry.instances_for_model(service, model);
        if candidates.is_empty() {
            return Err(GatewayError::NoInstancesAvailable(match model {
                Some(model) if !self.registry.instances(service).is_empty() => {
                    format!("no instance of model {} for service {}", model, service)
                }
                _ => format!("no instances configured for service {}", service),
            }));
        }

        let healthy: Vec<ModelInstance> = candidates
            .into_iter()
            .filter(|i| self.state.is_instance_healthy(&i.instance_key()))
            .collect();
        if healthy.is_empty() {
            return Err(GatewayError::NoHealthyInstances(format!(
                "every instance of {} failed its health check",
                service
            )));
        }

        let mut pool: Vec<ModelInstance> = healthy
            .into_iter()
            .filter(|i| self.circuit_breakers.is_available(i))
            .collect();
        if pool.is_empty() {
            return Err(GatewayError::CircuitOpen(format!(
                "every instance of {} has an open circuit",
                service
            )));
        }

        let mut context = RateLimitContext::new(1).with_service(service);
        if let Some(ip) = client_ip {
            context = context.with_client_ip(ip);
        }
        if !self.rate_limiters.try_acquire(service, &context) {
            return Err(GatewayError::RateLimited(format!("service {}", service)));
        }

        let balancer = self.load_balancers.get_load_balancer(service);
        let mut instance_limited = false;
        for _ in 0..MAX_SELECTION_ATTEMPTS {
            let picked = balancer.select_instance(&pool, client_ip)?.clone();
            let key = picked.instance_key();

            if !self.rate_limiters.try_acquire_instance(&picked, &context) {
                debug!("Instance {} rate limited, retrying selection", key);
                instance_limited = true;
            } else if !self.circuit_breakers.can_execute(&picked) {
                debug!("Instance {} refused by circuit breaker, retrying selection", key);
            } else {
                balancer.record_call(&picked);
                let strategy = balancer.strategy();
                notify(self.observer.as_ref(), |o| {
                    o.on_instance_selected(service, strategy.as_str(), &picked.name)
                });
                debug!("Routed {} to {} via {}", service, key, strategy);
                return Ok(Selection {
                    service,
                    instance: picked,
                    strategy,
                });
            }

            pool.retain(|i| i.instance_key() != key);
            if pool.is_empty() {
                break;
            }
        }

        if instance_limited {
            Err(GatewayError::RateLimited(format!("every instance of {}", service)))
        } else {
            Err(GatewayError::CircuitOpen(format!(
                "no instance of {} accepted a call",
                service
            )))
        }
    }

    /// Report a completed call
    pub fn record_success(&self, service: ServiceType, instance: &ModelInstance) {
        self.load_balancers
            .get_load_balancer(service)
            .record_call_complete(instance);
        self.circuit_breakers.record_success(instance);
    }

    /// Report a failed call
    pub fn record_failure(&self, service: ServiceType, instance: &ModelInstance) {
        self.load_balancers
            .get_load_balancer(service)
            .record_call_failure(instance);
        self.circuit_breakers.record_failure(instance);
    }

    // ==================== Fallback ====================

    /// Degraded response for `service` after `cause`, if one is configured
    pub fn fallback(&self, service: ServiceType, cause: &GatewayError) -> Option<FallbackResponse> {
        let config = self.config.load();
        self.fallback.fallback(service, config.fallback_for(service), cause)
    }

    /// Offer a successful response to the service's fallback cache
    pub fn cache_response(
        &self,
        service: ServiceType,
        client_ip: &str,
        model: &str,
        content: &str,
        response: Value,
    ) {
        let config = self.config.load();
        let key = CacheKey::new(service, client_ip, model, content);
        self.fallback
            .cache_response(service, config.fallback_for(service), key, response);
    }

    /// Forget the fallback strategy of `service`
    pub fn clear_fallback_strategy(&self, service: ServiceType) -> bool {
        self.fallback.clear_fallback_strategy(service)
    }

    // ==================== Reconfiguration ====================

    /// Replace the whole configuration.
    ///
    /// Strategy objects are rebuilt and swapped in. If any part is rejected,
    /// the previous configuration stays in effect and the error is returned.
    pub fn reload(&self, config: GatewayConfig) -> Result<()> {
        let _guard = self.reload_lock.lock();
        config.validate().map_err(|e| {
            error!("Rejected configuration reload: {}", e);
            GatewayError::Reconfiguration(e)
        })?;
        self.load_balancers.validate_configuration(&config).map_err(|e| {
            error!("Rejected configuration reload: {}", e);
            GatewayError::Reconfiguration(e.to_string())
        })?;
        self.rate_limiters.validate_configuration(&config).map_err(|e| {
            error!("Rejected configuration reload: {}", e);
            GatewayError::Reconfiguration(e.to_string())
        })?;

        let previous = self.config.load_full();
        self.load_balancers.update_configuration(&config)?;
        if let Err(e) = self.rate_limiters.update_configuration(&config) {
            if let Err(rollback) = self.load_balancers.update_configuration(&previous) {
                error!("Load balancer rollback failed: {}", rollback);
            }
            return Err(e);
        }

        self.registry.replace(&config);
        let keys = self.registry.instance_keys();
        let services: HashSet<ServiceType> = config.services.keys().copied().collect();

        self.circuit_breakers.update_config(config.circuit_breaker.clone());
        self.circuit_breakers.retain_keys(&keys);
        self.state.retain_instances(&keys);
        self.state.retain_services(&services);
        self.fallback.update_global_config(config.fallback.clone());
        self.health_checker.update_config(config.health_check.clone());
        self.cleanup.update_config(config.rate_limit_cleanup.clone());
        self.config.store(Arc::new(config));

        info!("Configuration reloaded: {} instances", keys.len());
        Ok(())
    }

    /// Replace the load balancer of one service
    pub fn update_service_load_balancer(&self, service: ServiceType, config: LoadBalanceConfig) -> Result<()> {
        self.load_balancers.update_service_load_balancer(service, config)
    }

    /// Rebuild the load balancer of one service from its configuration
    pub fn reinitialize_load_balancer(&self, service: ServiceType) -> LoadBalanceStrategy {
        self.load_balancers.reinitialize_load_balancer(service)
    }

    // ==================== Circuit breakers ====================

    /// Force the breaker of `instance_key` open
    pub fn force_open(&self, instance_key: &str) {
        self.circuit_breakers.force_open(instance_key);
    }

    /// Force the breaker of `instance_key` closed, resetting its counters
    pub fn force_close(&self, instance_key: &str) {
        self.circuit_breakers.force_close(instance_key);
    }

    /// Drop the breaker of `instance_key`
    pub fn reset_circuit_breaker(&self, instance_key: &str) -> bool {
        self.circuit_breakers.reset(instance_key)
    }

    /// State of the breaker of `instance_key`
    pub fn circuit_state(&self, instance_key: &str) -> CircuitState {
        self.circuit_breakers.state(instance_key)
    }

    /// State of every breaker
    pub fn circuit_states(&self) -> HashMap<String, CircuitState> {
        self.circuit_breakers.all_states()
    }

    // ==================== Health ====================

    /// Probe every instance now
    pub async fn run_health_check_now(&self) -> HealthSnapshot {
        self.health_checker.check_all().await
    }

    /// Current health flags
    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.state.snapshot()
    }

    /// Whether `service` has a reachable instance
    pub fn is_service_healthy(&self, service: ServiceType) -> bool {
        self.state.is_service_healthy(service)
    }

    /// Whether the instance with `instance_key` is reachable
    pub fn is_instance_healthy(&self, instance_key: &str) -> bool {
        self.state.is_instance_healthy(instance_key)
    }

    // ==================== Accessors ====================

    /// Configuration in effect
    pub fn config(&self) -> Arc<GatewayConfig> {
        self.config.load_full()
    }

    /// Instance registry
    pub fn registry(&self) -> &Arc<ModelServiceRegistry> {
        &self.registry
    }

    /// Health flag store
    pub fn state(&self) -> &Arc<ServiceStateManager> {
        &self.state
    }

    /// Circuit breaker registry
    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.circuit_breakers
    }

    /// Load balancer manager
    pub fn load_balancers(&self) -> &LoadBalancerManager {
        &self.load_balancers
    }

    /// Rate limiter manager
    pub fn rate_limiters(&self) -> &Arc<RateLimiterManager> {
        &self.rate_limiters
    }

    /// Fallback manager
    pub fn fallback_manager(&self) -> &FallbackManager {
        &self.fallback
    }

    /// Strategy per service with its own load balancer
    pub fn load_balancer_status(&self) -> BTreeMap<ServiceType, LoadBalanceStrategy> {
        self.load_balancers.status()
    }

    /// Status of every service rate limiter
    pub fn rate_limiter_status(&self) -> BTreeMap<ServiceType, RateLimiterStatus> {
        self.rate_limiters.status()
    }
}

impl Drop for TrafficManager {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for TrafficManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficManager")
            .field("services", &self.registry.service_types())
            .field("load_balancers", &self.load_balancers)
            .field("rate_limiters", &self.rate_limiters)
            .field("circuit_breakers", &self.circuit_breakers)
            .finish()
    }
}
