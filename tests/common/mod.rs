//! Common test utilities for modelrouter-rs
//!
//! - Fixtures for instances and router configurations
//! - A scripted health probe
//! - Distribution assertions

pub mod assertions;
pub mod fixtures;

pub use fixtures::{ConfigFactory, InstanceFactory, ScriptedProbe};
