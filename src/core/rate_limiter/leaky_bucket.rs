//! Leaky bucket rate limiter

use super::{RateLimitAlgorithm, RateLimitContext, RateLimiter};
use crate::config::RateLimitConfig;
use crate::utils::clock::{NANOS_PER_SEC, monotonic_nanos};
use std::sync::atomic::{AtomicU64, Ordering};

/// Admits work while it fits in a bucket that drains at `rate` units per
/// second. An empty bucket does not bank drain time.
#[derive(Debug)]
pub struct LeakyBucketRateLimiter {
    config: RateLimitConfig,
    water: AtomicU64,
    last_leak: AtomicU64,
}

impl LeakyBucketRateLimiter {
    /// Create an empty bucket
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            water: AtomicU64::new(0),
            last_leak: AtomicU64::new(monotonic_nanos()),
        }
    }

    /// Current water level, without leaking
    pub fn water_level(&self) -> u64 {
        self.water.load(Ordering::Relaxed)
    }

    fn leak(&self) {
        let rate = self.config.rate;
        if rate == 0 {
            return;
        }

        let now = monotonic_nanos();
        let last = self.last_leak.load(Ordering::Acquire);
        let level = self.water.load(Ordering::Acquire);
        if level == 0 {
            if now > last {
                let _ = self.last_leak.compare_exchange(
                    last,
                    now,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            return;
        }

        let elapsed = u128::from(now.saturating_sub(last));
        let leaked = elapsed * u128::from(rate) / u128::from(NANOS_PER_SEC);
        if leaked == 0 {
            return;
        }

        let (drain, next) = if leaked >= u128::from(level) {
            (level, now)
        } else {
            let used = leaked * u128::from(NANOS_PER_SEC) / u128::from(rate);
            (leaked as u64, last + used as u64)
        };

        if self
            .last_leak
            .compare_exchange(last, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            let _ = self
                .water
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                    Some(w.saturating_sub(drain))
                });
        }
    }
}

impl RateLimiter for LeakyBucketRateLimiter {
    fn try_acquire(&self, context: &RateLimitContext) -> bool {
        if !self.config.enabled {
            return true;
        }

        self.leak();

        let permits = context.permits();
        let mut current = self.water.load(Ordering::Acquire);
        loop {
            let filled = match current.checked_add(permits) {
                Some(filled) if filled <= self.config.capacity => filled,
                _ => return false,
            };
            match self.water.compare_exchange_weak(
                current,
                filled,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn algorithm(&self) -> RateLimitAlgorithm {
        RateLimitAlgorithm::LeakyBucket
    }
}
