//! Weighted least-connections selection

use super::{LoadBalanceStrategy, LoadBalancer, ensure_candidates};
use crate::config::ModelInstance;
use crate::utils::error::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Picks the instance with the fewest outstanding calls per unit of weight.
///
/// Outstanding calls are counted through the lifecycle hooks. Ties on the
/// weighted score go to the smaller raw count, then to list order.
#[derive(Debug, Default)]
pub struct LeastConnectionsLoadBalancer {
    connections: DashMap<String, AtomicU64>,
}

impl LeastConnectionsLoadBalancer {
    /// Create a new least-connections load balancer
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding calls currently tracked for an instance key
    pub fn active_connections(&self, instance_key: &str) -> u64 {
        self.connections
            .get(instance_key)
            .map(|c| c.load(Relaxed))
            .unwrap_or(0)
    }

    fn decrement(&self, instance: &ModelInstance) {
        // Absent keys stay absent and zero never wraps
        if let Some(counter) = self.connections.get(&instance.instance_key()) {
            let _ = counter.fetch_update(Relaxed, Relaxed, |current| current.checked_sub(1));
        }
    }
}

impl LoadBalancer for LeastConnectionsLoadBalancer {
    fn select_instance<'a>(
        &self,
        candidates: &'a [ModelInstance],
        _client_ip: Option<&str>,
    ) -> Result<&'a ModelInstance> {
        ensure_candidates(candidates, LoadBalanceStrategy::LeastConnections)?;

        let mut best = &candidates[0];
        let mut best_count = self.active_connections(&best.instance_key());
        let mut best_score = best_count as f64 / f64::from(best.effective_weight());

        for candidate in &candidates[1..] {
            let count = self.active_connections(&candidate.instance_key());
            let score = count as f64 / f64::from(candidate.effective_weight());
            if score < best_score || (score == best_score && count < best_count) {
                best = candidate;
                best_count = count;
                best_score = score;
            }
        }

        Ok(best)
    }

    fn strategy(&self) -> LoadBalanceStrategy {
        LoadBalanceStrategy::LeastConnections
    }

    fn record_call(&self, instance: &ModelInstance) {
        self.connections
            .entry(instance.instance_key())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Relaxed);
    }

    fn record_call_complete(&self, instance: &ModelInstance) {
        self.decrement(instance);
    }

    fn record_call_failure(&self, instance: &ModelInstance) {
        self.decrement(instance);
    }
}
