//! Circuit breaker state and statistics

use serde::Serialize;
use std::fmt;

/// Circuit breaker state
///
/// Maps to `AtomicU8` values for lock-free updates:
/// - 0 = Closed
/// - 1 = Open
/// - 2 = HalfOpen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CircuitState {
    /// Requests flow normally
    Closed = 0,
    /// Requests are rejected
    Open = 1,
    /// Trial requests are allowed
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl From<CircuitState> for u8 {
    fn from(state: CircuitState) -> Self {
        state as u8
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Transition reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitEvent {
    /// Failure rate tripped the breaker, or a trial call failed
    Opened,
    /// Cool-down elapsed, trial calls allowed
    HalfOpened,
    /// A trial call succeeded
    Closed,
    /// Administratively opened
    ForcedOpen,
    /// Administratively closed, counters reset
    ForcedClosed,
}

/// Snapshot of a breaker's rolling counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CircuitBreakerStats {
    /// Current state
    pub state: CircuitState,
    /// Successful calls in the window
    pub success_count: u64,
    /// Failed calls in the window
    pub failure_count: u64,
    /// Completed calls in the window
    pub request_count: u64,
}

impl CircuitBreakerStats {
    /// `failure_count / request_count`, 0 when no requests were recorded
    pub fn failure_rate(&self) -> f64 {
        if self.request_count == 0 {
            0.0
        } else {
            self.failure_count as f64 / self.request_count as f64
        }
    }
}
