//! Backend health tracking
//!
//! [`ServiceStateManager`] stores health flags; [`HealthChecker`] probes every
//! configured instance on an interval and writes the results.

mod checker;
mod state;


pub use checker::{HealthChecker, HealthProbe, TcpProbe, resolve_target};
pub use state::{HealthSnapshot, ServiceStateManager};
