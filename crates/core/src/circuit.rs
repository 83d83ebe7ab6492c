//! Per-handler circuit breaker state.

use serde::{Deserialize, Serialize};

/// Circuit breaker state machine, strictly per-event (§9 open question (b)
/// is resolved in favor of per-event, never aggregated by domain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CircuitState {
    /// Admitting calls normally.
    Closed,
    /// Rejecting calls; waiting for the backoff window to elapse.
    Open,
    /// Admitting a bounded number of probe calls to test recovery.
    HalfOpen,
}

/// Circuit breaker record for a single event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive (or windowed) failure count while `Closed`.
    pub failures: u32,
    /// Consecutive probe successes while `HalfOpen`.
    pub successes: u32,
    /// Timestamp the circuit last opened, milliseconds since epoch.
    pub opened_at: Option<i64>,
    /// Probes admitted since entering `HalfOpen`.
    pub allowed_in_half_open: u32,
    /// Number of times this circuit has opened, used to compute the
    /// exponential backoff multiplier.
    pub open_attempts: u32,
}

impl Default for Circuit {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            opened_at: None,
            allowed_in_half_open: 0,
            open_attempts: 0,
        }
    }
}
