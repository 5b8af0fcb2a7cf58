//! Load balancer manager

use crate::config::{GatewayConfig, LoadBalanceConfig, ServiceType};
use crate::core::factory::ComponentFactory;
use crate::core::load_balancer::{LoadBalanceStrategy, LoadBalancer};
use crate::utils::error::{GatewayError, Result};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone)]
struct BalancerEntry {
    config: LoadBalanceConfig,
    balancer: Arc<dyn LoadBalancer>,
}

#[derive(Clone)]
struct BalancerTable {
    default: BalancerEntry,
    services: HashMap<ServiceType, BalancerEntry>,
}

/// Owns one load balancer per service plus a default for unconfigured
/// services.
///
/// Reads are a single atomic load. Writers are serialised by a mutex that is
/// never taken on the request path.
pub struct LoadBalancerManager {
    factory: Arc<ComponentFactory>,
    table: ArcSwap<BalancerTable>,
    write_lock: Mutex<()>,
}

impl LoadBalancerManager {
    /// Manager whose only balancer is the random default
    pub fn new(factory: Arc<ComponentFactory>) -> Self {
        let config = LoadBalanceConfig::default();
        let balancer = factory.create_load_balancer(&config);
        Self {
            factory,
            table: ArcSwap::from_pointee(BalancerTable {
                default: BalancerEntry { config, balancer },
                services: HashMap::new(),
            }),
            write_lock: Mutex::new(()),
        }
    }

    /// Build every balancer from `config`. Unknown types fall back to random.
    pub fn initialize(&self, config: &GatewayConfig) {
        let _guard = self.write_lock.lock();
        let table = self.build_table(config, |factory, cfg| Ok(factory.create_load_balancer(cfg)));
        if let Ok(table) = table {
            info!(
                "Initialized {} load balancers (default {})",
                table.services.len(),
                table.default.balancer.strategy()
            );
            self.table.store(Arc::new(table));
        }
    }

    /// Balancer for `service`, or the default when the service has none
    pub fn get_load_balancer(&self, service: ServiceType) -> Arc<dyn LoadBalancer> {
        let table = self.table.load();
        match table.services.get(&service) {
            Some(entry) => Arc::clone(&entry.balancer),
            None => Arc::clone(&table.default.balancer),
        }
    }

    /// Replace the balancer of one service.
    ///
    /// An invalid configuration is rejected and the current balancer keeps
    /// serving.
    pub fn update_service_load_balancer(&self, service: ServiceType, config: LoadBalanceConfig) -> Result<()> {
        let _guard = self.write_lock.lock();
        let balancer = self.factory.try_create_load_balancer(&config).map_err(|e| {
            error!("Rejected load balancer update for {}: {}", service, e);
            GatewayError::Reconfiguration(format!("load balancer for {}: {}", service, e))
        })?;

        let mut table = self.table.load().as_ref().clone();
        let previous = table
            .services
            .insert(service, BalancerEntry { config, balancer: Arc::clone(&balancer) });
        info!(
            "Load balancer for {} switched from {} to {}",
            service,
            previous
                .map(|e| e.balancer.strategy().as_str())
                .unwrap_or("default"),
            balancer.strategy()
        );
        self.table.store(Arc::new(table));
        Ok(())
    }

    /// Recreate the balancer of `service` from its stored configuration,
    /// resetting any per-strategy state. Falls back to random when the stored
    /// configuration no longer resolves.
    pub fn reinitialize_load_balancer(&self, service: ServiceType) -> LoadBalanceStrategy {
        let _guard = self.write_lock.lock();
        let mut table = self.table.load().as_ref().clone();
        let config = table
            .services
            .get(&service)
            .map(|e| e.config.clone())
            .unwrap_or_else(|| table.default.config.clone());

        let balancer = match self.factory.try_create_load_balancer(&config) {
            Ok(balancer) => balancer,
            Err(e) => {
                warn!("Reinitializing {} with random load balancer: {}", service, e);
                self.factory
                    .create_load_balancer(&LoadBalanceConfig::default())
            }
        };
        let strategy = balancer.strategy();
        table.services.insert(service, BalancerEntry { config, balancer });
        self.table.store(Arc::new(table));
        info!("Reinitialized {} load balancer for {}", strategy, service);
        strategy
    }

    /// Replace every balancer from `config`; all-or-nothing
    pub fn update_configuration(&self, config: &GatewayConfig) -> Result<()> {
        let _guard = self.write_lock.lock();
        let table = self
            .build_table(config, |factory, cfg| factory.try_create_load_balancer(cfg))
            .map_err(|e| {
                error!("Load balancer reconfiguration rejected: {}", e);
                GatewayError::Reconfiguration(e.to_string())
            })?;
        info!("Reconfigured {} load balancers", table.services.len());
        self.table.store(Arc::new(table));
        Ok(())
    }

    /// Check the global and every per-service load balancing configuration
    pub fn validate_configuration(&self, config: &GatewayConfig) -> Result<()> {
        self.factory.validate_load_balance_config(&config.load_balance)?;
        for (service, service_config) in &config.services {
            if let Some(lb) = &service_config.load_balance {
                self.factory
                    .validate_load_balance_config(lb)
                    .map_err(|e| GatewayError::Validation(format!("service {}: {}", service, e)))?;
            }
        }
        Ok(())
    }

    /// Strategy in use per configured service
    pub fn status(&self) -> BTreeMap<ServiceType, LoadBalanceStrategy> {
        self.table
            .load()
            .services
            .iter()
            .map(|(service, entry)| (*service, entry.balancer.strategy()))
            .collect()
    }

    /// Strategy used for unconfigured services
    pub fn default_strategy(&self) -> LoadBalanceStrategy {
        self.table.load().default.balancer.strategy()
    }

    /// Number of services with their own balancer
    pub fn len(&self) -> usize {
        self.table.load().services.len()
    }

    /// Whether no service has its own balancer
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `service` has its own balancer
    pub fn has_load_balancer(&self, service: ServiceType) -> bool {
        self.table.load().services.contains_key(&service)
    }

    /// Install a pre-built balancer for `service`
    pub fn set_load_balancer(&self, service: ServiceType, balancer: Arc<dyn LoadBalancer>) {
        let _guard = self.write_lock.lock();
        let mut table = self.table.load().as_ref().clone();
        let config = LoadBalanceConfig::with_type(balancer.strategy().as_str());
        table.services.insert(service, BalancerEntry { config, balancer });
        self.table.store(Arc::new(table));
    }

    fn build_table<F>(&self, config: &GatewayConfig, create: F) -> Result<BalancerTable>
    where
        F: Fn(&ComponentFactory, &LoadBalanceConfig) -> Result<Arc<dyn LoadBalancer>>,
    {
        let default = BalancerEntry {
            config: config.load_balance.clone(),
            balancer: create(&self.factory, &config.load_balance)?,
        };

        let mut services = HashMap::with_capacity(config.services.len());
        for service in config.services.keys() {
            let lb_config = config.load_balance_for(*service).clone();
            let balancer = create(&self.factory, &lb_config)
                .map_err(|e| GatewayError::Validation(format!("service {}: {}", service, e)))?;
            services.insert(*service, BalancerEntry { config: lb_config, balancer });
        }

        Ok(BalancerTable { default, services })
    }
}

impl std::fmt::Debug for LoadBalancerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancerManager")
            .field("services", &self.status())
            .field("default", &self.default_strategy())
            .finish()
    }
}
