//! Instance registry
//!
//! Holds the configured instance list of every service behind an atomically
//! swapped snapshot. Readers never observe a half-applied reconfiguration.

use crate::config::{GatewayConfig, ModelInstance, ServiceType};
use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Instance lists keyed by service
pub type InstanceMap = HashMap<ServiceType, Arc<Vec<ModelInstance>>>;

/// Read-mostly registry of configured instances
#[derive(Debug, Default)]
pub struct ModelServiceRegistry {
    services: ArcSwap<InstanceMap>,
}

impl ModelServiceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated from configuration
    pub fn from_config(config: &GatewayConfig) -> Self {
        let registry = Self::new();
        registry.replace(config);
        registry
    }

    /// Replace every instance list at once
    pub fn replace(&self, config: &GatewayConfig) {
        let services: InstanceMap = config
            .services
            .iter()
            .map(|(service, cfg)| (*service, Arc::new(cfg.instances.clone())))
            .collect();
        let total: usize = services.values().map(|v| v.len()).sum();
        info!("Registry loaded {} instances across {} services", total, services.len());
        self.services.store(Arc::new(services));
    }

    /// Current snapshot of every service
    pub fn snapshot(&self) -> Arc<InstanceMap> {
        self.services.load_full()
    }

    /// Instances of `service`, empty when the service is not configured
    pub fn instances(&self, service: ServiceType) -> Arc<Vec<ModelInstance>> {
        self.services
            .load()
            .get(&service)
            .cloned()
            .unwrap_or_default()
    }

    /// Instances of `service` serving `model`.
    ///
    /// A missing or blank model name matches every instance.
    pub fn instances_for_model(&self, service: ServiceType, model: Option<&str>) -> Vec<ModelInstance> {
        let instances = self.instances(service);
        match model.map(str::trim).filter(|m| !m.is_empty()) {
            Some(model) => instances
                .iter()
                .filter(|instance| instance.name == model)
                .cloned()
                .collect(),
            None => instances.as_ref().clone(),
        }
    }

    /// Every configured instance paired with its service
    pub fn all_instances(&self) -> Vec<(ServiceType, ModelInstance)> {
        let mut all: Vec<(ServiceType, ModelInstance)> = self
            .services
            .load()
            .iter()
            .flat_map(|(service, instances)| instances.iter().map(|i| (*service, i.clone())))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Services with at least one configured instance
    pub fn service_types(&self) -> Vec<ServiceType> {
        let mut services: Vec<ServiceType> = self
            .services
            .load()
            .iter()
            .filter(|(_, instances)| !instances.is_empty())
            .map(|(service, _)| *service)
            .collect();
        services.sort();
        services
    }

    /// Every configured instance key
    pub fn instance_keys(&self) -> HashSet<String> {
        self.services
            .load()
            .values()
            .flat_map(|instances| instances.iter().map(|i| i.instance_key()))
            .collect()
    }

    /// Find an instance of `service` by key
    pub fn find(&self, service: ServiceType, instance_key: &str) -> Option<ModelInstance> {
        self.instances(service)
            .iter()
            .find(|instance| instance.instance_key() == instance_key)
            .cloned()
    }
}
