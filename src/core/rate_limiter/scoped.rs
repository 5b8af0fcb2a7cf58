//! Scope-aware wrapper around a rate limiter

use super::{RateLimitAlgorithm, RateLimitContext, RateLimitScope, RateLimiter};
use crate::config::RateLimitConfig;
use crate::utils::clock::{duration_nanos, monotonic_nanos};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Builds a fresh limiter for a new client
pub type LimiterBuilder = Arc<dyn Fn() -> Arc<dyn RateLimiter> + Send + Sync>;

/// Key used for per-client-IP requests that carry no IP
const UNKNOWN_CLIENT: &str = "unknown";

struct ClientLimiter {
    limiter: Arc<dyn RateLimiter>,
    last_access: AtomicU64,
}

/// Applies a limiter either globally or per client IP.
///
/// Per-client limiters are created lazily and evicted by
/// [`evict_idle`](ScopedRateLimiter::evict_idle). Callers hold their own
/// `Arc` to the limiter while acquiring, so eviction never invalidates an
/// in-flight call; the next call for that client simply starts a fresh one.
pub struct ScopedRateLimiter {
    config: RateLimitConfig,
    scope: RateLimitScope,
    algorithm: RateLimitAlgorithm,
    shared: Arc<dyn RateLimiter>,
    builder: LimiterBuilder,
    clients: DashMap<String, ClientLimiter>,
}

impl ScopedRateLimiter {
    /// Wrap limiters produced by `builder` with the given scope
    pub fn new(config: RateLimitConfig, scope: RateLimitScope, builder: LimiterBuilder) -> Self {
        let shared = builder();
        let algorithm = shared.algorithm();
        Self {
            config,
            scope,
            algorithm,
            shared,
            builder,
            clients: DashMap::new(),
        }
    }

    /// Scope in effect
    pub fn scope(&self) -> RateLimitScope {
        self.scope
    }

    /// Number of live per-client limiters
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn client_limiter(&self, client: &str) -> Arc<dyn RateLimiter> {
        let now = monotonic_nanos();
        if let Some(entry) = self.clients.get(client) {
            entry.last_access.store(now, Ordering::Relaxed);
            return Arc::clone(&entry.limiter);
        }

        let entry = self
            .clients
            .entry(client.to_string())
            .or_insert_with(|| {
                debug!("Creating rate limiter for client {}", client);
                ClientLimiter {
                    limiter: (self.builder)(),
                    last_access: AtomicU64::new(now),
                }
            });
        entry.last_access.store(now, Ordering::Relaxed);
        Arc::clone(&entry.limiter)
    }

    /// Drop per-client limiters idle for longer than `idle`, returning how
    /// many were removed
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let now = monotonic_nanos();
        let idle_nanos = duration_nanos(idle);
        let before = self.clients.len();
        self.clients.retain(|_, entry| {
            now.saturating_sub(entry.last_access.load(Ordering::Relaxed)) <= idle_nanos
        });
        before.saturating_sub(self.clients.len())
    }
}

impl RateLimiter for ScopedRateLimiter {
    fn try_acquire(&self, context: &RateLimitContext) -> bool {
        match self.scope {
            RateLimitScope::Global => self.shared.try_acquire(context),
            RateLimitScope::PerClientIp => {
                let client = context
                    .client_ip
                    .as_deref()
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .unwrap_or(UNKNOWN_CLIENT);
                let limiter = self.client_limiter(client);
                limiter.try_acquire(context)
            }
        }
    }

    fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn algorithm(&self) -> RateLimitAlgorithm {
        self.algorithm
    }
}

impl std::fmt::Debug for ScopedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedRateLimiter")
            .field("algorithm", &self.algorithm)
            .field("scope", &self.scope)
            .field("clients", &self.clients.len())
            .finish()
    }
}
