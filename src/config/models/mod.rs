//! Configuration data models
//!
//! This module defines all configuration structures consumed by the router.

pub mod circuit_breaker;
pub mod fallback;
pub mod gateway;
pub mod health;
pub mod instance;
pub mod load_balance;
pub mod rate_limit;
pub mod service;

pub use circuit_breaker::*;
pub use fallback::*;
pub use gateway::*;
pub use health::*;
pub use instance::*;
pub use load_balance::*;
pub use rate_limit::*;
pub use service::*;

/// Default instance weight
pub fn default_weight() -> u32 {
    1
}

/// Default for `enabled` flags
pub fn default_true() -> bool {
    true
}
