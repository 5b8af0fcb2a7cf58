//! Per-instance circuit breaker registry

use super::breaker::CircuitBreaker;
use super::types::CircuitState;
use crate::config::{CircuitBreakerConfig, ModelInstance};
use crate::core::observability::{SharedObserver, noop_observer};
use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Lazily creates one breaker per instance key from a shared configuration
pub struct CircuitBreakerManager {
    config: ArcSwap<CircuitBreakerConfig>,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    observer: SharedObserver,
}

impl CircuitBreakerManager {
    /// Create an empty manager
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_observer(config, noop_observer())
    }

    /// Create an empty manager whose breakers report to `observer`
    pub fn with_observer(config: CircuitBreakerConfig, observer: SharedObserver) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            breakers: DashMap::new(),
            observer,
        }
    }

    /// Breaker for `key`, created on first use
    pub fn get_or_create(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(key) {
            return Arc::clone(breaker.value());
        }
        let breaker = self
            .breakers
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!("Creating circuit breaker for {}", key);
                Arc::new(CircuitBreaker::with_observer(
                    key,
                    self.config.load().as_ref().clone(),
                    Arc::clone(&self.observer),
                ))
            });
        Arc::clone(breaker.value())
    }

    /// Existing breaker for `key`
    pub fn get(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key).map(|b| Arc::clone(b.value()))
    }

    /// Whether a call to `instance` may proceed, consuming a trial permit
    pub fn can_execute(&self, instance: &ModelInstance) -> bool {
        self.get_or_create(&instance.instance_key()).can_execute()
    }

    /// Whether `instance` could take a call, without side effects.
    ///
    /// Instances without a breaker are available.
    pub fn is_available(&self, instance: &ModelInstance) -> bool {
        self.breakers
            .get(&instance.instance_key())
            .map(|b| b.is_available())
            .unwrap_or(true)
    }

    /// Record a successful call to `instance`
    pub fn record_success(&self, instance: &ModelInstance) {
        self.get_or_create(&instance.instance_key()).record_success();
    }

    /// Record a failed call to `instance`
    pub fn record_failure(&self, instance: &ModelInstance) {
        self.get_or_create(&instance.instance_key()).record_failure();
    }

    /// State of the breaker for `key`; unknown keys are closed
    pub fn state(&self, key: &str) -> CircuitState {
        self.breakers
            .get(key)
            .map(|b| b.state())
            .unwrap_or(CircuitState::Closed)
    }

    /// State of every breaker
    pub fn all_states(&self) -> HashMap<String, CircuitState> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }

    /// Administratively open the breaker for `key`
    pub fn force_open(&self, key: &str) {
        self.get_or_create(key).force_open();
    }

    /// Administratively close the breaker for `key`
    pub fn force_close(&self, key: &str) {
        self.get_or_create(key).force_close();
    }

    /// Drop the breaker for `key`; the next call starts closed
    pub fn reset(&self, key: &str) -> bool {
        self.breakers.remove(key).is_some()
    }

    /// Drop every breaker
    pub fn clear_all(&self) {
        self.breakers.clear();
    }

    /// Number of breakers
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether no breaker exists yet
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Configuration used for new breakers
    pub fn config(&self) -> Arc<CircuitBreakerConfig> {
        self.config.load_full()
    }

    /// Replace the configuration. Existing breakers are dropped when it
    /// changes, so every instance starts over under the new thresholds.
    pub fn update_config(&self, config: CircuitBreakerConfig) {
        if *self.config.load().as_ref() == config {
            return;
        }
        info!("Circuit breaker configuration changed, resetting {} breakers", self.breakers.len());
        self.config.store(Arc::new(config));
        self.breakers.clear();
    }

    /// Drop breakers whose key is not in `keys`
    pub fn retain_keys(&self, keys: &std::collections::HashSet<String>) {
        self.breakers.retain(|key, _| keys.contains(key));
    }
}

impl std::fmt::Debug for CircuitBreakerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerManager")
            .field("breakers", &self.breakers.len())
            .finish()
    }
}
