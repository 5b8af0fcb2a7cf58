//! Circuit breaking
//!
//! One [`CircuitBreaker`] guards each backend instance. The
//! [`CircuitBreakerManager`] creates them lazily, keyed by instance key.

mod breaker;
mod manager;
mod types;


pub use breaker::CircuitBreaker;
pub use manager::CircuitBreakerManager;
pub use types::{CircuitBreakerStats, CircuitEvent, CircuitState};
