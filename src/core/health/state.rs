//! Health flag store

use crate::config::ServiceType;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Point-in-time copy of every health flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    /// Service type health
    pub services: HashMap<ServiceType, bool>,
    /// Instance health keyed by instance key
    pub instances: HashMap<String, bool>,
}

/// Concurrent key-value store of health flags.
///
/// Unknown services and instances are reported healthy until a check says
/// otherwise.
#[derive(Debug, Default)]
pub struct ServiceStateManager {
    service_health: DashMap<ServiceType, bool>,
    instance_health: DashMap<String, bool>,
}

impl ServiceStateManager {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `service` has at least one reachable instance
    pub fn is_service_healthy(&self, service: ServiceType) -> bool {
        self.service_health
            .get(&service)
            .map(|h| *h.value())
            .unwrap_or(true)
    }

    /// Whether the instance with `instance_key` is reachable
    pub fn is_instance_healthy(&self, instance_key: &str) -> bool {
        self.instance_health
            .get(instance_key)
            .map(|h| *h.value())
            .unwrap_or(true)
    }

    /// Set a service's health, returning the previous value
    pub fn update_service_health(&self, service: ServiceType, healthy: bool) -> Option<bool> {
        self.service_health.insert(service, healthy)
    }

    /// Set an instance's health, returning the previous value
    pub fn update_instance_health(&self, instance_key: &str, healthy: bool) -> Option<bool> {
        self.instance_health.insert(instance_key.to_string(), healthy)
    }

    /// Copy every flag
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            services: self
                .service_health
                .iter()
                .map(|e| (*e.key(), *e.value()))
                .collect(),
            instances: self
                .instance_health
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
        }
    }

    /// Forget every instance flag
    pub fn clear_instance_health(&self) {
        self.instance_health.clear();
    }

    /// Forget instance flags whose key is not in `keys`
    pub fn retain_instances(&self, keys: &HashSet<String>) {
        self.instance_health.retain(|key, _| keys.contains(key));
    }

    /// Forget service flags for services not in `services`
    pub fn retain_services(&self, services: &HashSet<ServiceType>) {
        self.service_health.retain(|service, _| services.contains(service));
    }
}
