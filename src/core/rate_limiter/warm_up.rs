//! Token bucket with a linear warm-up

use super::token_bucket::TokenBucketState;
use super::{RateLimitAlgorithm, RateLimitContext, RateLimiter};
use crate::config::RateLimitConfig;
use crate::utils::clock::{NANOS_PER_SEC, monotonic_nanos};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Token bucket whose refill rate ramps linearly from 1 token/s up to the
/// configured `rate` over `warm_up_period` seconds.
///
/// The ramp restarts from [`reset_warm_up`](WarmUpRateLimiter::reset_warm_up),
/// typically after a cold period.
#[derive(Debug)]
pub struct WarmUpRateLimiter {
    config: RateLimitConfig,
    bucket: TokenBucketState,
    warm_up_nanos: u64,
    warm_up_start: AtomicU64,
}

impl WarmUpRateLimiter {
    /// Create a full bucket whose ramp starts now
    pub fn new(config: RateLimitConfig) -> Self {
        let bucket = TokenBucketState::new(config.capacity);
        let warm_up_nanos = config.warm_up_period.saturating_mul(NANOS_PER_SEC);
        Self {
            config,
            bucket,
            warm_up_nanos,
            warm_up_start: AtomicU64::new(monotonic_nanos()),
        }
    }

    /// Restart the warm-up ramp
    pub fn reset_warm_up(&self) {
        debug!("Restarting rate limiter warm-up");
        self.warm_up_start.store(monotonic_nanos(), Ordering::Release);
    }

    /// Refill rate in effect right now
    pub fn current_rate(&self) -> u64 {
        let since_start = monotonic_nanos().saturating_sub(self.warm_up_start.load(Ordering::Acquire));
        if since_start >= self.warm_up_nanos {
            return self.config.rate;
        }
        let ramped = u128::from(self.config.rate) * u128::from(since_start)
            / u128::from(self.warm_up_nanos);
        (ramped as u64).max(1)
    }
}

impl RateLimiter for WarmUpRateLimiter {
    fn try_acquire(&self, context: &RateLimitContext) -> bool {
        if !self.config.enabled {
            return true;
        }
        self.bucket.refill(self.current_rate());
        self.bucket.try_take(context.permits())
    }

    fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn algorithm(&self) -> RateLimitAlgorithm {
        RateLimitAlgorithm::WarmUp
    }
}
