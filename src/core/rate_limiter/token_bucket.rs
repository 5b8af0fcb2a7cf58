//! Token bucket rate limiter

use super::{RateLimitAlgorithm, RateLimitContext, RateLimiter};
use crate::config::RateLimitConfig;
use crate::utils::clock::{NANOS_PER_SEC, monotonic_nanos};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free bucket shared by the token bucket and warm-up limiters.
///
/// `tokens` holds whole tokens. `last_refill` only advances by the time that
/// produced whole tokens, so fractional progress carries into the next refill.
/// Time spent at capacity earns nothing: a full bucket, or a refill clipped by
/// the cap, moves `last_refill` to now.
#[derive(Debug)]
pub(super) struct TokenBucketState {
    capacity: u64,
    tokens: AtomicU64,
    last_refill: AtomicU64,
}

impl TokenBucketState {
    /// Full bucket
    pub(super) fn new(capacity: u64) -> Self {
        Self {
            capacity,
            tokens: AtomicU64::new(capacity),
            last_refill: AtomicU64::new(monotonic_nanos()),
        }
    }

    /// Add the tokens accrued since the last refill at `rate` tokens/s.
    ///
    /// Only the caller that wins the CAS on `last_refill` adds tokens; losers
    /// skip the refill for this interval.
    pub(super) fn refill(&self, rate: u64) {
        if rate == 0 {
            return;
        }

        let now = monotonic_nanos();
        let last = self.last_refill.load(Ordering::Acquire);
        let room = self
            .capacity
            .saturating_sub(self.tokens.load(Ordering::Acquire));
        if room == 0 {
            if now > last {
                let _ = self.last_refill.compare_exchange(
                    last,
                    now,
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                );
            }
            return;
        }

        let elapsed = u128::from(now.saturating_sub(last));
        let accrued = elapsed * u128::from(rate) / u128::from(NANOS_PER_SEC);
        if accrued == 0 {
            return;
        }

        let (to_add, next) = if accrued >= u128::from(room) {
            (room, now)
        } else {
            let used = accrued * u128::from(NANOS_PER_SEC) / u128::from(rate);
            (accrued as u64, last + used as u64)
        };

        if self
            .last_refill
            .compare_exchange(last, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            self.add(to_add);
        }
    }

    fn add(&self, amount: u64) {
        let mut current = self.tokens.load(Ordering::Acquire);
        loop {
            let updated = current.saturating_add(amount).min(self.capacity);
            if updated == current {
                return;
            }
            match self.tokens.compare_exchange_weak(
                current,
                updated,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Take `permits` tokens if available
    pub(super) fn try_take(&self, permits: u64) -> bool {
        let mut current = self.tokens.load(Ordering::Acquire);
        loop {
            if current < permits {
                return false;
            }
            match self.tokens.compare_exchange_weak(
                current,
                current - permits,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Tokens currently in the bucket
    pub(super) fn available(&self) -> u64 {
        self.tokens.load(Ordering::Relaxed)
    }
}

/// Classic token bucket: starts full, refills at `rate` tokens per second up
/// to `capacity`.
#[derive(Debug)]
pub struct TokenBucketRateLimiter {
    config: RateLimitConfig,
    bucket: TokenBucketState,
}

impl TokenBucketRateLimiter {
    /// Create a full bucket from `config`
    pub fn new(config: RateLimitConfig) -> Self {
        let bucket = TokenBucketState::new(config.capacity);
        Self { config, bucket }
    }

    /// Tokens currently available, without refilling
    pub fn available_tokens(&self) -> u64 {
        self.bucket.available()
    }
}

impl RateLimiter for TokenBucketRateLimiter {
    fn try_acquire(&self, context: &RateLimitContext) -> bool {
        if !self.config.enabled {
            return true;
        }
        self.bucket.refill(self.config.rate);
        self.bucket.try_take(context.permits())
    }

    fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn algorithm(&self) -> RateLimitAlgorithm {
        RateLimitAlgorithm::TokenBucket
    }
}
