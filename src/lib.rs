//! modelrouter-rs - traffic management core for an AI model routing gateway
//!
//! The crate decides, for every inbound request, which backend instance of a
//! logical service should receive it, and whether the request may proceed at all.
//!
//! ## Components
//!
//! - [`core::load_balancer`] - weighted random, weighted round-robin,
//!   least-connections and consistent IP-hash selection
//! - [`core::rate_limiter`] - token bucket, leaky bucket, sliding window and
//!   warm-up limiters built on atomic compare-and-swap loops
//! - [`core::circuit_breaker`] - per-instance failure-rate state machines
//! - [`core::health`] - health flags and the periodic TCP health checker
//! - [`core::fallback`] - degraded responses when routing cannot complete
//! - [`core::traffic`] - the composition root tying everything together
//!
//! ## Example
//!
//! ```rust,no_run
//! use modelrouter::{Config, TrafficManager};
//! use modelrouter::config::ServiceType;
//! use std::sync::Arc;
//!
//! # async fn run() -> modelrouter::Result<()> {
//! let config = Config::from_file("config/router.yaml").await?;
//! let traffic = Arc::new(TrafficManager::new(config.gateway)?);
//! traffic.start();
//!
//! let selection = traffic.select_instance(ServiceType::Chat, Some("gpt-4o"), Some("10.0.0.7"))?;
//! // ... dispatch the request ...
//! traffic.record_success(ServiceType::Chat, &selection.instance);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod core;
pub mod utils;

pub use config::Config;
pub use core::traffic::{Selection, TrafficManager};
pub use utils::error::{GatewayError, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
