//! Monotonic nanosecond clock
//!
//! Lock-free algorithms store timestamps in `AtomicU64`, so they need a
//! monotonic time source expressed as a plain integer. All readings are
//! relative to a process-wide anchor taken on first use.

use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

static ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);

/// Nanoseconds per second
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Current monotonic time in nanoseconds since the process anchor.
///
/// Never returns 0, so callers may use 0 as "never happened".
pub fn monotonic_nanos() -> u64 {
    ANCHOR.elapsed().as_nanos() as u64 + 1
}

/// Nanoseconds elapsed since `since`, saturating at zero.
pub fn nanos_since(since: u64) -> u64 {
    monotonic_nanos().saturating_sub(since)
}

/// Convert a duration to nanoseconds, saturating at `u64::MAX`
pub fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
