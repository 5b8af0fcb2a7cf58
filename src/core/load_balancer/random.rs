//! Weighted random selection

use super::{LoadBalanceStrategy, LoadBalancer, ensure_candidates};
use crate::config::ModelInstance;
use crate::utils::error::Result;
use rand::Rng;

/// Selects instances randomly in proportion to their weight.
///
/// When every weight is zero the draw is uniform.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomLoadBalancer;

impl RandomLoadBalancer {
    /// Create a new random load balancer
    pub fn new() -> Self {
        Self
    }
}

/// Weighted draw shared with the strategies that degrade to random.
///
/// `candidates` must be non-empty.
pub(crate) fn weighted_random(candidates: &[ModelInstance]) -> &ModelInstance {
    let mut rng = rand::thread_rng();
    let total_weight: u64 = candidates.iter().map(|c| u64::from(c.weight)).sum();

    if total_weight == 0 {
        return &candidates[rng.gen_range(0..candidates.len())];
    }

    let point = rng.gen_range(0..total_weight);
    let mut cumulative = 0u64;
    for candidate in candidates {
        cumulative += u64::from(candidate.weight);
        if point < cumulative {
            return candidate;
        }
    }

    // Unreachable with a consistent total, kept deterministic regardless
    &candidates[candidates.len() - 1]
}

impl LoadBalancer for RandomLoadBalancer {
    fn select_instance<'a>(
        &self,
        candidates: &'a [ModelInstance],
        _client_ip: Option<&str>,
    ) -> Result<&'a ModelInstance> {
        ensure_candidates(candidates, LoadBalanceStrategy::Random)?;
        Ok(weighted_random(candidates))
    }

    fn strategy(&self) -> LoadBalanceStrategy {
        LoadBalanceStrategy::Random
    }
}
