//! Consistent hashing on the client IP

use super::random::weighted_random;
use super::{LoadBalanceStrategy, LoadBalancer, ensure_candidates};
use crate::config::ModelInstance;
use crate::utils::error::Result;
use crate::utils::hashing::HashAlgorithm;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Virtual nodes per unit of weight
pub const VIRTUAL_NODES_PER_WEIGHT: u32 = 100;

/// Rings kept before the cache is flushed
const MAX_CACHED_RINGS: usize = 64;

/// Hash ring for one ordered candidate list, mapping positions to indices
#[derive(Debug)]
struct HashRing {
    nodes: BTreeMap<u64, usize>,
}

impl HashRing {
    fn build(candidates: &[ModelInstance], algorithm: HashAlgorithm) -> Self {
        let mut nodes = BTreeMap::new();
        for (index, candidate) in candidates.iter().enumerate() {
            let replicas = VIRTUAL_NODES_PER_WEIGHT * candidate.effective_weight();
            for i in 0..replicas {
                let node = format!("{}:{}#{}", candidate.base_url, candidate.path, i);
                nodes.insert(algorithm.hash64(&node), index);
            }
        }
        Self { nodes }
    }

    /// First node at or after `hash`, wrapping to the start of the ring
    fn locate(&self, hash: u64) -> Option<usize> {
        self.nodes
            .range(hash..)
            .next()
            .or_else(|| self.nodes.iter().next())
            .map(|(_, index)| *index)
    }
}

/// Maps each client IP to a stable instance using a weighted hash ring.
///
/// A ring holds `100 x weight` virtual nodes per instance, so changing one
/// instance only remaps the keys adjacent to its nodes. Requests without a
/// client IP are served by weighted random selection.
pub struct IpHashLoadBalancer {
    algorithm: HashAlgorithm,
    rings: DashMap<String, Arc<HashRing>>,
}

impl IpHashLoadBalancer {
    /// Create a balancer using the named digest (unknown names use a simple hash)
    pub fn new(hash_algorithm: &str) -> Self {
        Self::with_algorithm(HashAlgorithm::parse(hash_algorithm))
    }

    /// Create a balancer using an already resolved digest
    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            rings: DashMap::new(),
        }
    }

    /// Digest in use
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn ring_for(&self, candidates: &[ModelInstance]) -> Arc<HashRing> {
        // Indices are positional, so the key keeps list order and weights
        let key = candidates
            .iter()
            .map(|c| format!("{}|{}", c.instance_key(), c.effective_weight()))
            .collect::<Vec<_>>()
            .join(",");

        if let Some(ring) = self.rings.get(&key) {
            return Arc::clone(ring.value());
        }

        if self.rings.len() >= MAX_CACHED_RINGS {
            debug!("Flushing {} cached hash rings", self.rings.len());
            self.rings.clear();
        }

        let ring = Arc::new(HashRing::build(candidates, self.algorithm));
        self.rings.insert(key, Arc::clone(&ring));
        ring
    }
}

impl std::fmt::Debug for IpHashLoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpHashLoadBalancer")
            .field("algorithm", &self.algorithm)
            .field("cached_rings", &self.rings.len())
            .finish()
    }
}

impl LoadBalancer for IpHashLoadBalancer {
    fn select_instance<'a>(
        &self,
        candidates: &'a [ModelInstance],
        client_ip: Option<&str>,
    ) -> Result<&'a ModelInstance> {
        ensure_candidates(candidates, LoadBalanceStrategy::IpHash)?;

        let client_ip = match client_ip.map(str::trim) {
            Some(ip) if !ip.is_empty() => ip,
            _ => {
                debug!("No client IP for ip-hash selection, using weighted random");
                return Ok(weighted_random(candidates));
            }
        };

        if candidates.len() == 1 {
            return Ok(&candidates[0]);
        }

        let ring = self.ring_for(candidates);
        let index = ring
            .locate(self.algorithm.hash64(client_ip))
            .unwrap_or(candidates.len() - 1);
        Ok(&candidates[index])
    }

    fn strategy(&self) -> LoadBalanceStrategy {
        LoadBalanceStrategy::IpHash
    }
}
