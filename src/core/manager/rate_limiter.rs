//! Rate limiter manager

use crate::config::{GatewayConfig, ModelInstance, RateLimitConfig, ServiceType};
use crate::core::factory::ComponentFactory;
use crate::core::observability::{SharedObserver, notify};
use crate::core::rate_limiter::{RateLimitContext, RateLimiter, ScopedRateLimiter};
use crate::utils::error::{GatewayError, Result};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Default)]
struct LimiterTable {
    services: HashMap<ServiceType, Arc<ScopedRateLimiter>>,
    instances: HashMap<String, Arc<ScopedRateLimiter>>,
}

/// Snapshot of one service limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimiterStatus {
    /// Algorithm name
    pub algorithm: &'static str,
    /// Configured scope
    pub scope: String,
    /// Bucket capacity
    pub capacity: u64,
    /// Configured rate
    pub rate: u64,
    /// Live per-client limiters
    pub clients: usize,
}

/// Owns the service-level and instance-level rate limiters.
///
/// Services and instances without an enabled rate limit are unlimited.
pub struct RateLimiterManager {
    factory: Arc<ComponentFactory>,
    observer: SharedObserver,
    table: ArcSwap<LimiterTable>,
    write_lock: Mutex<()>,
}

impl RateLimiterManager {
    /// Manager without any limiter
    pub fn new(factory: Arc<ComponentFactory>) -> Self {
        let observer = factory.observer();
        Self {
            factory,
            observer,
            table: ArcSwap::from_pointee(LimiterTable::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Build every limiter from `config`. Unknown algorithms fall back to the
    /// token bucket.
    pub fn initialize(&self, config: &GatewayConfig) {
        let _guard = self.write_lock.lock();
        let table = self.build_table(config, |factory, cfg| Ok(factory.create_scoped_rate_limiter(cfg)));
        if let Ok(table) = table {
            info!(
                "Initialized {} service and {} instance rate limiters",
                table.services.len(),
                table.instances.len()
            );
            self.table.store(Arc::new(table));
        }
    }

    /// Limiter guarding `service`
    pub fn limiter(&self, service: ServiceType) -> Option<Arc<ScopedRateLimiter>> {
        self.table.load().services.get(&service).cloned()
    }

    /// Limiter guarding the instance with key `instance_key`
    pub fn instance_limiter(&self, instance_key: &str) -> Option<Arc<ScopedRateLimiter>> {
        self.table.load().instances.get(instance_key).cloned()
    }

    /// Admission check for `service`; always passes when unlimited
    pub fn try_acquire(&self, service: ServiceType, context: &RateLimitContext) -> bool {
        let Some(limiter) = self.limiter(service) else {
            return true;
        };
        let allowed = limiter.try_acquire(context);
        if !allowed {
            debug!("Rate limit rejected request for {}", service);
        }
        let algorithm = limiter.algorithm();
        notify(self.observer.as_ref(), |o| {
            o.on_rate_limit(Some(service), algorithm.as_str(), allowed)
        });
        allowed
    }

    /// Admission check for one instance; always passes when unlimited
    pub fn try_acquire_instance(&self, instance: &ModelInstance, context: &RateLimitContext) -> bool {
        let key = instance.instance_key();
        let Some(limiter) = self.instance_limiter(&key) else {
            return true;
        };
        let allowed = limiter.try_acquire(context);
        if !allowed {
            debug!("Rate limit rejected request for instance {}", key);
        }
        let algorithm = limiter.algorithm();
        notify(self.observer.as_ref(), |o| {
            o.on_rate_limit(context.service_type, algorithm.as_str(), allowed)
        });
        allowed
    }

    /// Drop per-client limiters idle for longer than `idle`
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let table = self.table.load();
        table
            .services
            .values()
            .chain(table.instances.values())
            .map(|limiter| limiter.evict_idle(idle))
            .sum()
    }

    /// Replace every limiter from `config`; all-or-nothing
    pub fn update_configuration(&self, config: &GatewayConfig) -> Result<()> {
        let _guard = self.write_lock.lock();
        let table = self
            .build_table(config, |factory, cfg| factory.try_create_scoped_rate_limiter(cfg))
            .map_err(|e| {
                error!("Rate limiter reconfiguration rejected: {}", e);
                GatewayError::Reconfiguration(e.to_string())
            })?;
        info!(
            "Reconfigured {} service and {} instance rate limiters",
            table.services.len(),
            table.instances.len()
        );
        self.table.store(Arc::new(table));
        Ok(())
    }

    /// Check every enabled rate limit in `config`
    pub fn validate_configuration(&self, config: &GatewayConfig) -> Result<()> {
        self.build_table(config, |factory, cfg| {
            factory.validate_rate_limit_config(cfg)?;
            factory.try_create_scoped_rate_limiter(cfg)
        })
        .map(|_| ())
    }

    /// Status of every service limiter
    pub fn status(&self) -> BTreeMap<ServiceType, RateLimiterStatus> {
        self.table
            .load()
            .services
            .iter()
            .map(|(service, limiter)| {
                let config = limiter.config();
                (
                    *service,
                    RateLimiterStatus {
                        algorithm: limiter.algorithm().as_str(),
                        scope: config.scope.clone(),
                        capacity: config.capacity,
                        rate: config.rate,
                        clients: limiter.client_count(),
                    },
                )
            })
            .collect()
    }

    /// Number of service limiters
    pub fn len(&self) -> usize {
        self.table.load().services.len()
    }

    /// Whether no service is limited
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn build_table<F>(&self, config: &GatewayConfig, create: F) -> Result<LimiterTable>
    where
        F: Fn(&ComponentFactory, &RateLimitConfig) -> Result<Arc<ScopedRateLimiter>>,
    {
        let mut table = LimiterTable::default();
        for (service, service_config) in &config.services {
            if let Some(rl) = config.rate_limit_for(*service).filter(|rl| rl.enabled) {
                let limiter = create(&self.factory, rl)
                    .map_err(|e| GatewayError::Validation(format!("service {}: {}", service, e)))?;
                table.services.insert(*service, limiter);
            }

            for instance in &service_config.instances {
                if let Some(rl) = instance.rate_limit.as_ref().filter(|rl| rl.enabled) {
                    let key = instance.instance_key();
                    let limiter = create(&self.factory, rl)
                        .map_err(|e| GatewayError::Validation(format!("instance {}: {}", key, e)))?;
                    table.instances.insert(key, limiter);
                }
            }
        }
        Ok(table)
    }
}

impl std::fmt::Debug for RateLimiterManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.load();
        f.debug_struct("RateLimiterManager")
            .field("services", &table.services.len())
            .field("instances", &table.instances.len())
            .finish()
    }
}
