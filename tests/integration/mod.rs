//! Integration tests for modelrouter-rs
//!
//! These tests drive the public API across component boundaries without
//! mocking the components under test.

pub mod circuit_breaker_tests;
pub mod config_tests;
pub mod health_check_tests;
pub mod load_balancing_tests;
pub mod rate_limiting_tests;
pub mod traffic_manager_tests;
