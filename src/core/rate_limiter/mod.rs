//! Rate limiting algorithms
//!
//! Four lock-free limiters share the [`RateLimiter`] contract:
//!
//! - [`TokenBucketRateLimiter`] - refill at `rate` tokens/s up to `capacity`
//! - [`LeakyBucketRateLimiter`] - water drains at `rate` units/s, admit while it fits
//! - [`SlidingWindowRateLimiter`] - at most `rate` requests in any 1000 ms window
//! - [`WarmUpRateLimiter`] - token bucket whose refill rate ramps up linearly
//!
//! Every algorithm keeps its state in atomics and retries compare-and-swap
//! loops instead of taking locks. [`ScopedRateLimiter`] adds per-client-IP
//! scoping on top of any of them.

mod leaky_bucket;
mod scoped;
mod sliding_window;
mod token_bucket;
mod types;
mod warm_up;


pub use leaky_bucket::LeakyBucketRateLimiter;
pub use scoped::{LimiterBuilder, ScopedRateLimiter};
pub use sliding_window::{
    MAX_SLIDING_WINDOW_RATE, SLIDING_WINDOW_MILLIS, SlidingWindowRateLimiter,
};
pub use token_bucket::TokenBucketRateLimiter;
pub use types::{RateLimitAlgorithm, RateLimitContext, RateLimitScope};
pub use warm_up::WarmUpRateLimiter;

use crate::config::RateLimitConfig;

/// Non-blocking admission check
pub trait RateLimiter: Send + Sync {
    /// Try to take `context.tokens` permits; never blocks
    fn try_acquire(&self, context: &RateLimitContext) -> bool;

    /// Configuration this limiter was built from
    fn config(&self) -> &RateLimitConfig;

    /// Algorithm implemented by this limiter
    fn algorithm(&self) -> RateLimitAlgorithm;
}
