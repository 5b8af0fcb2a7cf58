//! Shared utilities
//!
//! Error types, the monotonic clock used by the lock-free algorithms, and
//! digest helpers.

pub mod clock;
pub mod error;
pub mod hashing;
