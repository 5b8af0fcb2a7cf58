//! Sliding window rate limiter

use super::{RateLimitAlgorithm, RateLimitContext, RateLimiter};
use crate::config::RateLimitConfig;
use crate::utils::clock::monotonic_nanos;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Window length in milliseconds
pub const SLIDING_WINDOW_MILLIS: u64 = 1000;

/// Largest `rate` a sliding window accepts; the ring holds one slot per
/// admission
pub const MAX_SLIDING_WINDOW_RATE: u64 = 10_000;

const WINDOW_NANOS: u64 = SLIDING_WINDOW_MILLIS * 1_000_000;

/// Admits at most `rate` requests in any trailing 1000 ms window.
///
/// The admission log is a ring of `rate` timestamps. The slot at `head` holds
/// the oldest of the last `rate` admissions: if it is still inside the window
/// the limit is reached, otherwise the caller claims it with a CAS and moves
/// `head` forward. Each call counts as one request regardless of the tokens
/// requested.
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    config: RateLimitConfig,
    slots: Box<[AtomicU64]>,
    head: AtomicU64,
}

impl SlidingWindowRateLimiter {
    /// Create an empty window. A `rate` above [`MAX_SLIDING_WINDOW_RATE`] is
    /// capped to it.
    pub fn new(config: RateLimitConfig) -> Self {
        if config.rate > MAX_SLIDING_WINDOW_RATE {
            warn!(
                "Sliding window rate {} exceeds {}, capping",
                config.rate, MAX_SLIDING_WINDOW_RATE
            );
        }
        let size = config.rate.clamp(1, MAX_SLIDING_WINDOW_RATE) as usize;
        let slots = (0..size).map(|_| AtomicU64::new(0)).collect();
        Self {
            config,
            slots,
            head: AtomicU64::new(0),
        }
    }

    /// Admissions recorded inside the current window
    pub fn current_count(&self) -> usize {
        let now = monotonic_nanos();
        self.slots
            .iter()
            .filter(|slot| {
                let ts = slot.load(Ordering::Relaxed);
                ts != 0 && now.saturating_sub(ts) < WINDOW_NANOS
            })
            .count()
    }
}

impl RateLimiter for SlidingWindowRateLimiter {
    fn try_acquire(&self, _context: &RateLimitContext) -> bool {
        if !self.config.enabled {
            return true;
        }

        let len = self.slots.len() as u64;
        loop {
            let head = self.head.load(Ordering::Acquire);
            let slot = &self.slots[(head % len) as usize];
            let oldest = slot.load(Ordering::Acquire);
            let now = monotonic_nanos();

            if oldest != 0 && now.saturating_sub(oldest) < WINDOW_NANOS {
                if self.head.load(Ordering::Acquire) != head {
                    continue;
                }
                return false;
            }

            if slot
                .compare_exchange(oldest, now, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.head.fetch_add(1, Ordering::AcqRel);
                return true;
            }
        }
    }

    fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn algorithm(&self) -> RateLimitAlgorithm {
        RateLimitAlgorithm::SlidingWindow
    }
}
