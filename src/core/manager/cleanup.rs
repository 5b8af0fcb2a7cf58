//! Idle per-client rate limiter eviction

use super::RateLimiterManager;
use crate::config::RateLimitCleanupConfig;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically evicts per-client-IP limiters that have been idle for longer
/// than `idle_timeout_secs`.
///
/// Callers hold their own `Arc` to a limiter while acquiring, so an eviction
/// racing a request only means the next request from that client starts with
/// a fresh limiter.
pub struct RateLimiterCleanup {
    limiters: Arc<RateLimiterManager>,
    config: ArcSwap<RateLimitCleanupConfig>,
}

impl RateLimiterCleanup {
    /// Create a cleanup task for `limiters`
    pub fn new(limiters: Arc<RateLimiterManager>, config: RateLimitCleanupConfig) -> Self {
        Self {
            limiters,
            config: ArcSwap::from_pointee(config),
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> Arc<RateLimitCleanupConfig> {
        self.config.load_full()
    }

    /// Replace the configuration; the next sweep uses it
    pub fn update_config(&self, config: RateLimitCleanupConfig) {
        self.config.store(Arc::new(config));
    }

    /// Delay between sweeps, never shorter than one second
    pub fn sweep_interval(&self) -> Duration {
        self.config.load().interval().max(MIN_SWEEP_INTERVAL)
    }

    /// Run a single sweep, returning the number of evicted limiters
    pub fn run_once(&self) -> usize {
        let idle = self.config.load().idle_timeout();
        let evicted = self.limiters.evict_idle(idle);
        if evicted > 0 {
            info!("Evicted {} idle rate limiters", evicted);
        } else {
            debug!("Rate limiter cleanup found nothing idle");
        }
        evicted
    }

    /// Sweep every `interval_secs` until the returned handle is aborted.
    /// While the configuration is disabled the loop only rechecks the flag
    /// once a second.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Rate limiter cleanup started (interval {}s, idle timeout {}s)",
                self.config.load().interval_secs,
                self.config.load().idle_timeout_secs
            );
            loop {
                if !self.config.load().enabled {
                    tokio::time::sleep(MIN_SWEEP_INTERVAL).await;
                    continue;
                }
                tokio::time::sleep(self.sweep_interval()).await;
                if self.config.load().enabled {
                    self.run_once();
                }
            }
        })
    }
}

impl std::fmt::Debug for RateLimiterCleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterCleanup")
            .field("config", &self.config.load_full())
            .finish()
    }
}
