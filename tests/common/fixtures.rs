//! Test fixtures and data factories
//!
//! All factories create real objects, not mocks.

use async_trait::async_trait;
use modelrouter::config::{GatewayConfig, ModelInstance, ServiceConfig, ServiceType};
use modelrouter::core::health::HealthProbe;
use modelrouter::{GatewayError, Result};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::time::Duration;

/// Factory for backend instances
pub struct InstanceFactory;

impl InstanceFactory {
    /// Instance `n` of `model` on a private address
    pub fn create(model: &str, n: usize) -> ModelInstance {
        ModelInstance::new(model, format!("http://10.1.0.{}:8000", n), "/v1")
    }

    /// Instances with the given weights
    pub fn weighted(model: &str, weights: &[u32]) -> Vec<ModelInstance> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| Self::create(model, i + 1).with_weight(*w))
            .collect()
    }

    /// Instance on `127.0.0.1:port`
    pub fn local(model: &str, port: u16) -> ModelInstance {
        ModelInstance::new(model, format!("http://127.0.0.1:{}", port), "/v1")
    }
}

/// Factory for router configurations
pub struct ConfigFactory;

impl ConfigFactory {
    /// Configuration with one chat service and background tasks disabled
    pub fn chat(instances: Vec<ModelInstance>) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.health_check.enabled = false;
        config.rate_limit_cleanup.enabled = false;
        config
            .services
            .insert(ServiceType::Chat, ServiceConfig::with_instances(instances));
        config
    }

    /// Chat service with a per-service load balancing type
    pub fn chat_with_strategy(instances: Vec<ModelInstance>, lb_type: &str) -> GatewayConfig {
        let mut config = Self::chat(instances);
        if let Some(chat) = config.services.get_mut(&ServiceType::Chat) {
            chat.load_balance = Some(modelrouter::config::LoadBalanceConfig::with_type(lb_type));
        }
        config
    }
}

/// Health probe whose healthy ports can be changed while a test runs
#[derive(Default)]
pub struct ScriptedProbe {
    up: RwLock<HashSet<u16>>,
}

impl ScriptedProbe {
    /// Probe reporting `ports` as reachable
    pub fn with_up(ports: &[u16]) -> Self {
        Self {
            up: RwLock::new(ports.iter().copied().collect()),
        }
    }

    /// Mark `port` reachable or not
    pub fn set(&self, port: u16, up: bool) {
        let mut ports = self.up.write();
        if up {
            ports.insert(port);
        } else {
            ports.remove(&port);
        }
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, _host: &str, port: u16, _timeout: Duration) -> Result<()> {
        if self.up.read().contains(&port) {
            Ok(())
        } else {
            Err(GatewayError::HealthCheck(format!("port {} unreachable", port)))
        }
    }
}
