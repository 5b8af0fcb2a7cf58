//! Weighted round-robin selection

use super::{LoadBalanceStrategy, LoadBalancer, candidate_signature, ensure_candidates};
use crate::config::ModelInstance;
use crate::utils::error::Result;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use tracing::debug;

/// Counters kept before the map is flushed
const MAX_COUNTERS: usize = 256;

/// Cycles through a virtual list in which each instance appears
/// `max(1, weight)` times consecutively.
///
/// Counters are kept per candidate set signature, so services or filtered
/// subsets with different instances rotate independently. Health changes and
/// selection retries create new subsets, so the map is flushed once it holds
/// `MAX_COUNTERS` entries and every set restarts its rotation.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalancer {
    counters: DashMap<String, AtomicU64>,
}

impl RoundRobinLoadBalancer {
    /// Create a new round-robin load balancer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct candidate sets seen so far
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    fn next_position(&self, signature: String) -> u64 {
        if let Some(counter) = self.counters.get(&signature) {
            return counter.fetch_add(1, Relaxed);
        }
        if self.counters.len() >= MAX_COUNTERS {
            debug!("Flushing {} round-robin counters", self.counters.len());
            self.counters.clear();
        }
        debug!("Creating round-robin counter for candidate set {}", signature);
        self.counters
            .entry(signature)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Relaxed)
    }
}

impl LoadBalancer for RoundRobinLoadBalancer {
    fn select_instance<'a>(
        &self,
        candidates: &'a [ModelInstance],
        _client_ip: Option<&str>,
    ) -> Result<&'a ModelInstance> {
        ensure_candidates(candidates, LoadBalanceStrategy::RoundRobin)?;

        if candidates.len() == 1 {
            return Ok(&candidates[0]);
        }

        let virtual_size: u64 = candidates
            .iter()
            .map(|c| u64::from(c.effective_weight()))
            .sum();
        let index = self.next_position(candidate_signature(candidates)) % virtual_size;

        let mut cumulative = 0u64;
        for candidate in candidates {
            cumulative += u64::from(candidate.effective_weight());
            if index < cumulative {
                return Ok(candidate);
            }
        }

        Ok(&candidates[candidates.len() - 1])
    }

    fn strategy(&self) -> LoadBalanceStrategy {
        LoadBalanceStrategy::RoundRobin
    }
}
