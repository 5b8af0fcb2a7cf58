//! Fallback (degradation) handling
//!
//! When the routing pipeline cannot complete a call, the
//! [`FallbackManager`] asks the service's [`FallbackStrategy`] for a degraded
//! response.

mod cache;
mod manager;
mod strategy;


pub use cache::{CacheFallbackStrategy, CacheKey};
pub use manager::FallbackManager;
pub use strategy::{
    DefaultFallbackStrategy, FallbackResponse, FallbackStrategy, FallbackStrategyKind,
    degraded_payload,
};
