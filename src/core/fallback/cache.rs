//! Cache-backed fallback strategy

use super::strategy::{FallbackResponse, FallbackStrategy, FallbackStrategyKind, degraded_payload};
use crate::config::ServiceType;
use crate::utils::error::{GatewayError, Result};
use crate::utils::hashing::sha256_hex;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Message returned when nothing is cached yet
pub const NO_CACHE_MESSAGE: &str = "Service is currently degraded and no cached data available";

/// Identity of a cached response: `service:clientIp:model:sha256(content)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Service called
    pub service: ServiceType,
    /// Caller's IP
    pub client_ip: String,
    /// Model requested
    pub model: String,
    /// Hex SHA-256 of the request content
    pub content_hash: String,
}

impl CacheKey {
    /// Build a key, hashing `content`
    pub fn new(
        service: ServiceType,
        client_ip: impl Into<String>,
        model: impl Into<String>,
        content: &str,
    ) -> Self {
        Self {
            service,
            client_ip: client_ip.into(),
            model: model.into(),
            content_hash: sha256_hex(content),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.service, self.client_ip, self.model, self.content_hash
        )
    }
}

#[derive(Debug)]
struct CachedResponse {
    sequence: u64,
    body: Value,
}

/// Serves the most recently cached successful response.
///
/// The cache is bounded: inserting past `max_size` evicts the oldest entries.
#[derive(Debug)]
pub struct CacheFallbackStrategy {
    max_size: usize,
    sequence: AtomicU64,
    entries: DashMap<CacheKey, CachedResponse>,
}

impl CacheFallbackStrategy {
    /// Create an empty cache holding at most `max_size` responses
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            sequence: AtomicU64::new(0),
            entries: DashMap::new(),
        }
    }

    /// Number of cached responses
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum cached responses
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Cached body for `key`
    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries.get(key).map(|e| e.body.clone())
    }

    /// Drop every cached response
    pub fn clear(&self) {
        self.entries.clear();
    }

    fn evict_oldest(&self) {
        while self.entries.len() > self.max_size {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().sequence)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    debug!("Evicting cached fallback response {}", key);
                    self.entries.remove(&key);
                }
                None => return,
            }
        }
    }
}

impl FallbackStrategy for CacheFallbackStrategy {
    fn fallback(&self, service: ServiceType, cause: &GatewayError) -> Result<FallbackResponse> {
        let latest = self
            .entries
            .iter()
            .filter(|e| e.key().service == service)
            .max_by_key(|e| e.value().sequence)
            .map(|e| e.value().body.clone());

        Ok(match latest {
            Some(body) => FallbackResponse {
                status: 200,
                body,
                from_cache: true,
            },
            None => degraded_payload(service, cause, NO_CACHE_MESSAGE),
        })
    }

    fn cache_response(&self, key: CacheKey, response: Value) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            CachedResponse {
                sequence,
                body: response,
            },
        );
        self.evict_oldest();
    }

    fn kind(&self) -> FallbackStrategyKind {
        FallbackStrategyKind::Cache
    }
}
