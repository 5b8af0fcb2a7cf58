//! Core traffic management components

pub mod circuit_breaker;
pub mod factory;
pub mod fallback;
pub mod health;
pub mod load_balancer;
pub mod manager;
pub mod observability;
pub mod rate_limiter;
pub mod registry;
pub mod traffic;
