//! Periodic TCP health checker

use super::state::{HealthSnapshot, ServiceStateManager};
use crate::config::{HealthCheckConfig, ModelInstance, ServiceType};
use crate::core::observability::{SharedObserver, noop_observer, notify};
use crate::core::registry::ModelServiceRegistry;
use crate::utils::error::{GatewayError, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

const MIN_CYCLE_INTERVAL: Duration = Duration::from_secs(1);

/// Reachability probe for one `(host, port)` pair
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Succeed if the endpoint accepts a connection within `timeout`
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> Result<()>;
}

/// Probe that opens (and immediately drops) a TCP connection
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> Result<()> {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(GatewayError::HealthCheck(format!(
                "Connection to {}:{} failed: {}",
                host, port, e
            ))),
            Err(_) => Err(GatewayError::HealthCheck(format!(
                "Connection to {}:{} timed out after {:?}",
                host, port, timeout
            ))),
        }
    }
}

/// Resolve an instance base URL to the `(host, port)` to probe.
///
/// Only `http` and `https` are accepted; a missing port defaults to 80 or 443.
pub fn resolve_target(base_url: &str) -> Result<(String, u16)> {
    let url = Url::parse(base_url)
        .map_err(|e| GatewayError::HealthCheck(format!("Invalid URL '{}': {}", base_url, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(GatewayError::HealthCheck(format!(
                "Unsupported scheme '{}' in URL '{}'",
                other, base_url
            )));
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| GatewayError::HealthCheck(format!("URL '{}' has no host", base_url)))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| GatewayError::HealthCheck(format!("URL '{}' has no port", base_url)))?;

    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
    Ok((host, port))
}

/// Probes every configured instance and records the results.
///
/// Each instance is probed on its own task, so a slow or failing endpoint
/// never delays or aborts the checks of its siblings.
pub struct HealthChecker {
    registry: Arc<ModelServiceRegistry>,
    state: Arc<ServiceStateManager>,
    config: ArcSwap<HealthCheckConfig>,
    probe: Arc<dyn HealthProbe>,
    observer: SharedObserver,
}

impl HealthChecker {
    /// Create a checker using TCP probes
    pub fn new(
        registry: Arc<ModelServiceRegistry>,
        state: Arc<ServiceStateManager>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            state,
            config: ArcSwap::from_pointee(config),
            probe: Arc::new(TcpProbe),
            observer: noop_observer(),
        }
    }

    /// Replace the probe
    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Report probe results to `observer`
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Configuration in effect
    pub fn config(&self) -> Arc<HealthCheckConfig> {
        self.config.load_full()
    }

    /// Replace the configuration; the next cycle uses it
    pub fn update_config(&self, config: HealthCheckConfig) {
        self.config.store(Arc::new(config));
    }

    /// Probe one instance without recording the result
    pub async fn check_instance(&self, instance: &ModelInstance) -> bool {
        let timeout = self.config.load().connect_timeout();
        probe_instance(self.probe.as_ref(), instance, timeout).await
    }

    /// Probe every instance of every service and record the results
    pub async fn check_all(&self) -> HealthSnapshot {
        let services = self.registry.snapshot();
        let timeout = self.config.load().connect_timeout();

        let mut targets: Vec<(ServiceType, String)> = Vec::new();
        let mut tasks: Vec<JoinHandle<(bool, Duration)>> = Vec::new();
        for (service, instances) in services.iter() {
            for instance in instances.iter() {
                let probe = Arc::clone(&self.probe);
                let instance = instance.clone();
                targets.push((*service, instance.instance_key()));
                tasks.push(tokio::spawn(async move {
                    let started = Instant::now();
                    let healthy = probe_instance(probe.as_ref(), &instance, timeout).await;
                    (healthy, started.elapsed())
                }));
            }
        }

        let results = join_all(tasks).await;

        let mut service_health: HashMap<ServiceType, bool> =
            services.keys().map(|service| (*service, false)).collect();

        for ((service, key), result) in targets.into_iter().zip(results) {
            let healthy = match result {
                Ok((healthy, elapsed)) => {
                    notify(self.observer.as_ref(), |o| o.on_health_check(&key, healthy, elapsed));
                    healthy
                }
                Err(e) => {
                    error!("Health check task for {} failed: {}", key, e);
                    false
                }
            };

            let previous = self.state.update_instance_health(&key, healthy);
            if previous.unwrap_or(true) != healthy {
                info!(
                    "Instance {} is now {}",
                    key,
                    if healthy { "healthy" } else { "unhealthy" }
                );
            }

            if healthy {
                service_health.insert(service, true);
            }
        }

        for (service, healthy) in service_health {
            let previous = self.state.update_service_health(service, healthy);
            if previous.unwrap_or(true) != healthy {
                if healthy {
                    info!("Service {} recovered", service);
                } else {
                    warn!("Service {} has no healthy instances", service);
                }
            }
        }

        self.state.snapshot()
    }

    /// Delay before the next cycle, never shorter than one second
    pub fn cycle_interval(&self) -> Duration {
        self.config.load().interval().max(MIN_CYCLE_INTERVAL)
    }

    /// Run [`check_all`](Self::check_all) immediately and then every
    /// `interval_secs` until the returned handle is aborted.
    /// While the configuration is disabled the loop only rechecks the flag
    /// once a second.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Health checker started (interval {}s)",
                self.config.load().interval_secs
            );
            loop {
                let delay = if self.config.load().enabled {
                    let snapshot = self.check_all().await;
                    debug!(
                        "Health check cycle complete: {} instances, {} services",
                        snapshot.instances.len(),
                        snapshot.services.len()
                    );
                    self.cycle_interval()
                } else {
                    debug!("Health checking disabled, skipping cycle");
                    MIN_CYCLE_INTERVAL
                };
                tokio::time::sleep(delay).await;
            }
        })
    }
}

async fn probe_instance(probe: &dyn HealthProbe, instance: &ModelInstance, timeout: Duration) -> bool {
    let (host, port) = match resolve_target(&instance.base_url) {
        Ok(target) => target,
        Err(e) => {
            error!("Cannot check instance {}: {}", instance.name, e);
            return false;
        }
    };

    match probe.probe(&host, port, timeout).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check failed for instance {} ({}): {}", instance.name, instance.instance_key(), e);
            false
        }
    }
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("config", &self.config.load_full())
            .finish()
    }
}
