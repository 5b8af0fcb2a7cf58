//! Best-effort observability hooks
//!
//! Components report selections, circuit transitions, rate limit decisions and
//! probe results to a [`TrafficObserver`]. Observers run inline on the request
//! path, so they must be cheap; a panicking observer is contained and logged.

use crate::config::ServiceType;
use crate::core::circuit_breaker::{CircuitEvent, CircuitState};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Receiver of routing events. Every method defaults to a no-op.
pub trait TrafficObserver: Send + Sync {
    /// An instance was selected for `service` by `strategy`
    fn on_instance_selected(&self, _service: ServiceType, _strategy: &str, _instance: &str) {}

    /// A circuit breaker changed state
    fn on_circuit_event(&self, _breaker: &str, _state: CircuitState, _event: CircuitEvent) {}

    /// A rate limiter made a decision
    fn on_rate_limit(&self, _service: Option<ServiceType>, _algorithm: &str, _allowed: bool) {}

    /// A health probe finished
    fn on_health_check(&self, _instance: &str, _healthy: bool, _elapsed: Duration) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TrafficObserver for NoopObserver {}

/// Observer that emits `tracing` debug events
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl TrafficObserver for LoggingObserver {
    fn on_instance_selected(&self, service: ServiceType, strategy: &str, instance: &str) {
        debug!("Selected instance {} for {} using {}", instance, service, strategy);
    }

    fn on_circuit_event(&self, breaker: &str, state: CircuitState, event: CircuitEvent) {
        debug!("Circuit breaker {} event {:?}, now {}", breaker, event, state);
    }

    fn on_rate_limit(&self, service: Option<ServiceType>, algorithm: &str, allowed: bool) {
        let service = service.map(|s| s.as_str()).unwrap_or("unknown");
        debug!("Rate limit {} for {} via {}", if allowed { "passed" } else { "rejected" }, service, algorithm);
    }

    fn on_health_check(&self, instance: &str, healthy: bool, elapsed: Duration) {
        debug!("Health probe {} -> {} in {:?}", instance, healthy, elapsed);
    }
}

/// Shared observer handle
pub type SharedObserver = Arc<dyn TrafficObserver>;

/// Default observer handle
pub fn noop_observer() -> SharedObserver {
    Arc::new(NoopObserver)
}

/// Invoke an observer callback, containing any panic it raises.
pub fn notify<F>(observer: &dyn TrafficObserver, callback: F)
where
    F: FnOnce(&dyn TrafficObserver),
{
    if catch_unwind(AssertUnwindSafe(|| callback(observer))).is_err() {
        warn!("Traffic observer panicked, event dropped");
    }
}
