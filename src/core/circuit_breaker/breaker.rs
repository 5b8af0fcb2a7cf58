//! Failure-rate circuit breaker
//!
//! All state lives in atomics with no lock on the request path. Counters are
//! eventually consistent under concurrent updates; a racing caller may see a
//! slightly stale failure rate, which the next evaluation corrects.

use super::types::{CircuitBreakerStats, CircuitEvent, CircuitState};
use crate::config::CircuitBreakerConfig;
use crate::core::observability::{SharedObserver, noop_observer, notify};
use crate::utils::clock::{duration_nanos, monotonic_nanos};
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use tracing::{debug, info, warn};

const CLOSED: u8 = CircuitState::Closed as u8;
const OPEN: u8 = CircuitState::Open as u8;
const HALF_OPEN: u8 = CircuitState::HalfOpen as u8;

/// Circuit breaker for one backend.
///
/// - `CLOSED -> OPEN` once at least `minimum_request_threshold` calls were
///   recorded in the window and the failure rate meets the threshold
/// - `OPEN -> HALF_OPEN` after `timeout_secs`
/// - `HALF_OPEN -> CLOSED` on the next success, `HALF_OPEN -> OPEN` on the
///   next failure
///
/// Half-open admits `half_open_max_calls` trial calls. If those trials never
/// report back, a new permit is issued after another timeout.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    timeout_nanos: u64,
    window_nanos: u64,
    state: AtomicU8,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    request_count: AtomicU64,
    opened_at: AtomicU64,
    window_start: AtomicU64,
    half_open_permits: AtomicU32,
    half_open_since: AtomicU64,
    observer: SharedObserver,
}

impl CircuitBreaker {
    /// Create a closed breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_observer(name, config, noop_observer())
    }

    /// Create a closed breaker reporting transitions to `observer`
    pub fn with_observer(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        observer: SharedObserver,
    ) -> Self {
        let timeout_nanos = duration_nanos(config.timeout());
        let window_nanos = duration_nanos(config.window_size());
        Self {
            name: name.into(),
            config,
            timeout_nanos,
            window_nanos,
            state: AtomicU8::new(CLOSED),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            request_count: AtomicU64::new(0),
            opened_at: AtomicU64::new(0),
            window_start: AtomicU64::new(monotonic_nanos()),
            half_open_permits: AtomicU32::new(0),
            half_open_since: AtomicU64::new(0),
            observer,
        }
    }

    /// Breaker name, usually the instance key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration in effect
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Counter snapshot
    pub fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state(),
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            request_count: self.request_count.load(Ordering::Relaxed),
        }
    }

    /// Whether a call may proceed. Consumes a trial permit when half-open.
    pub fn can_execute(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if !self.cool_down_elapsed() {
                    return false;
                }
                self.transition_to_half_open();
                self.take_trial_permit()
            }
            CircuitState::HalfOpen => self.take_trial_permit(),
        }
    }

    /// Whether a call could proceed, without consuming a trial permit
    pub fn is_available(&self) -> bool {
        if !self.config.enabled {
            return true;
        }

        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => self.cool_down_elapsed(),
            CircuitState::HalfOpen => {
                self.half_open_permits.load(Ordering::Acquire) > 0 || self.trial_is_stale()
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }

        self.roll_window();
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.request_count.fetch_add(1, Ordering::Relaxed);

        match self.state() {
            CircuitState::HalfOpen => {
                if self
                    .state
                    .compare_exchange(HALF_OPEN, CLOSED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.reset_counters();
                    info!("Circuit breaker {} closed after successful trial call", self.name);
                    self.emit(CircuitState::Closed, CircuitEvent::Closed);
                }
            }
            CircuitState::Closed => self.evaluate(),
            CircuitState::Open => {}
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }

        self.roll_window();
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.request_count.fetch_add(1, Ordering::Relaxed);

        match self.state() {
            CircuitState::HalfOpen => {
                self.opened_at.store(monotonic_nanos(), Ordering::Release);
                if self
                    .state
                    .compare_exchange(HALF_OPEN, OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    warn!("Circuit breaker {} re-opened after failed trial call", self.name);
                    self.emit(CircuitState::Open, CircuitEvent::Opened);
                }
            }
            CircuitState::Closed => self.evaluate(),
            CircuitState::Open => {}
        }
    }

    /// Administratively open the breaker
    pub fn force_open(&self) {
        self.opened_at.store(monotonic_nanos(), Ordering::Release);
        self.state.store(OPEN, Ordering::Release);
        info!("Circuit breaker {} forced open", self.name);
        self.emit(CircuitState::Open, CircuitEvent::ForcedOpen);
    }

    /// Administratively close the breaker and reset its counters
    pub fn force_close(&self) {
        self.state.store(CLOSED, Ordering::Release);
        self.reset_counters();
        self.half_open_permits.store(0, Ordering::Release);
        self.window_start.store(monotonic_nanos(), Ordering::Release);
        info!("Circuit breaker {} forced closed", self.name);
        self.emit(CircuitState::Closed, CircuitEvent::ForcedClosed);
    }

    fn evaluate(&self) {
        let requests = self.request_count.load(Ordering::Relaxed);
        if requests < self.config.minimum_request_threshold {
            return;
        }

        let failures = self.failure_count.load(Ordering::Relaxed);
        let failure_rate = failures as f64 / requests as f64;
        if failure_rate < self.config.failure_rate_threshold {
            return;
        }

        self.opened_at.store(monotonic_nanos(), Ordering::Release);
        if self
            .state
            .compare_exchange(CLOSED, OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!(
                "Circuit breaker {} opened: {} failures out of {} requests ({:.1}%)",
                self.name,
                failures,
                requests,
                failure_rate * 100.0
            );
            self.emit(CircuitState::Open, CircuitEvent::Opened);
        }
    }

    fn cool_down_elapsed(&self) -> bool {
        monotonic_nanos().saturating_sub(self.opened_at.load(Ordering::Acquire)) >= self.timeout_nanos
    }

    fn transition_to_half_open(&self) {
        if self
            .state
            .compare_exchange(OPEN, HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.half_open_since.store(monotonic_nanos(), Ordering::Release);
            self.half_open_permits
                .store(self.config.half_open_max_calls.max(1), Ordering::Release);
            info!("Circuit breaker {} half-open, allowing trial calls", self.name);
            self.emit(CircuitState::HalfOpen, CircuitEvent::HalfOpened);
        }
    }

    fn take_trial_permit(&self) -> bool {
        let mut current = self.half_open_permits.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return self.refresh_stale_trial();
            }
            match self.half_open_permits.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn trial_is_stale(&self) -> bool {
        monotonic_nanos().saturating_sub(self.half_open_since.load(Ordering::Acquire))
            >= self.timeout_nanos
    }

    fn refresh_stale_trial(&self) -> bool {
        let since = self.half_open_since.load(Ordering::Acquire);
        let now = monotonic_nanos();
        if now.saturating_sub(since) < self.timeout_nanos {
            return false;
        }
        if self
            .half_open_since
            .compare_exchange(since, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        debug!("Circuit breaker {} trial calls went unanswered, issuing a new permit", self.name);
        self.half_open_permits
            .store(self.config.half_open_max_calls.max(1) - 1, Ordering::Release);
        true
    }

    fn roll_window(&self) {
        if self.window_nanos == 0 || self.state() != CircuitState::Closed {
            return;
        }
        let start = self.window_start.load(Ordering::Acquire);
        let now = monotonic_nanos();
        if now.saturating_sub(start) < self.window_nanos {
            return;
        }
        if self
            .window_start
            .compare_exchange(start, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("Circuit breaker {} window rolled over", self.name);
            self.reset_counters();
        }
    }

    fn reset_counters(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.request_count.store(0, Ordering::Relaxed);
    }

    fn emit(&self, state: CircuitState, event: CircuitEvent) {
        notify(self.observer.as_ref(), |o| o.on_circuit_event(&self.name, state, event));
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}
