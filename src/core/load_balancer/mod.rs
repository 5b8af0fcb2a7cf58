//! Load balancing strategies
//!
//! Every strategy implements [`LoadBalancer`]: pick one instance out of a
//! non-empty candidate list. Candidates are expected to be filtered by health
//! and circuit state before selection.
//!
//! - `random` - weighted random
//! - `round_robin` - weighted round-robin with a counter per candidate set
//! - `least_connections` - lowest outstanding calls per unit of weight
//! - `ip_hash` - consistent hashing of the client IP onto a weighted ring

mod ip_hash;
mod least_connections;
mod random;
mod round_robin;


pub use ip_hash::IpHashLoadBalancer;
pub use least_connections::LeastConnectionsLoadBalancer;
pub use random::RandomLoadBalancer;
pub use round_robin::RoundRobinLoadBalancer;

use crate::config::ModelInstance;
use crate::utils::error::{GatewayError, Result};
use std::fmt;

/// Available load balancing strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadBalanceStrategy {
    /// Weighted random
    #[default]
    Random,
    /// Weighted round-robin
    RoundRobin,
    /// Weighted least connections
    LeastConnections,
    /// Consistent hashing on the client IP
    IpHash,
}

impl LoadBalanceStrategy {
    /// Resolve a configured strategy name, `None` when unknown
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "random" => Some(LoadBalanceStrategy::Random),
            "round-robin" | "roundrobin" => Some(LoadBalanceStrategy::RoundRobin),
            "least-connections" | "leastconnections" => Some(LoadBalanceStrategy::LeastConnections),
            "ip-hash" | "iphash" => Some(LoadBalanceStrategy::IpHash),
            _ => None,
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalanceStrategy::Random => "random",
            LoadBalanceStrategy::RoundRobin => "round-robin",
            LoadBalanceStrategy::LeastConnections => "least-connections",
            LoadBalanceStrategy::IpHash => "ip-hash",
        }
    }
}

impl fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance selection strategy.
///
/// The call lifecycle hooks default to no-ops; strategies that track
/// outstanding calls override them.
pub trait LoadBalancer: Send + Sync {
    /// Select one instance from `candidates`.
    ///
    /// Fails with [`GatewayError::NoInstancesAvailable`] when the list is empty.
    fn select_instance<'a>(
        &self,
        candidates: &'a [ModelInstance],
        client_ip: Option<&str>,
    ) -> Result<&'a ModelInstance>;

    /// Strategy implemented by this balancer
    fn strategy(&self) -> LoadBalanceStrategy;

    /// A call was dispatched to `instance`
    fn record_call(&self, _instance: &ModelInstance) {}

    /// A call to `instance` completed
    fn record_call_complete(&self, _instance: &ModelInstance) {}

    /// A call to `instance` failed
    fn record_call_failure(&self, _instance: &ModelInstance) {}
}

pub(crate) fn ensure_candidates(
    candidates: &[ModelInstance],
    strategy: LoadBalanceStrategy,
) -> Result<()> {
    if candidates.is_empty() {
        return Err(GatewayError::NoInstancesAvailable(format!(
            "{} load balancer received an empty candidate list",
            strategy
        )));
    }
    Ok(())
}

/// Stable signature of a candidate set: sorted instance keys joined by `,`
pub(crate) fn candidate_signature(candidates: &[ModelInstance]) -> String {
    let mut keys: Vec<String> = candidates.iter().map(|c| c.instance_key()).collect();
    keys.sort_unstable();
    keys.join(",")
}
