//! Per-event circuit breaker state, backing the `circuit-breaker` middleware
//! layer in `claudebench-api`. Strictly per-event, never aggregated by
//! domain (§9 open question (b)).

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::circuit::{Circuit, CircuitState};
use claudebench_core::config::CircuitConfig;
use claudebench_core::key::Key;
use claudebench_core::{Error, Result};
use claudebench_storage::StoreOp;

fn circuit_key(event: &str) -> String {
    Key::circuit(event).as_str().to_string()
}

fn load(store: &claudebench_storage::StoreInner, event: &str, now: i64) -> Circuit {
    store
        .get_string(&circuit_key(event), now)
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

fn store_op(event: &str, circuit: &Circuit) -> StoreOp {
    StoreOp::SetString {
        key: circuit_key(event),
        value: serde_json::to_string(circuit).expect("Circuit always serializes"),
        expire_at_ms: None,
    }
}

/// Backoff before the first half-open probe after the `n`th open, per
/// §4.5: `timeout * multiplier^(attempts-1)`.
fn backoff_ms(config: &CircuitConfig, open_attempts: u32) -> i64 {
    let exponent = open_attempts.saturating_sub(1) as i32;
    (config.base_timeout_ms as f64 * config.multiplier.powi(exponent)) as i64
}

/// Outcome of a call the circuit admitted, fed back via [`CircuitTracker::record_outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The handler body succeeded.
    Success,
    /// The handler body failed in a way that counts against the circuit
    /// (validation failures never reach this point).
    Failure(claudebench_core::error::FailureKind),
}

/// Read/write facade over `cb:circuit:<event>`.
pub struct CircuitTracker {
    executor: AtomicExecutor,
    config: CircuitConfig,
}

impl CircuitTracker {
    /// Build a circuit tracker over a shared executor with the given defaults.
    pub fn new(executor: AtomicExecutor, config: CircuitConfig) -> Self {
        Self { executor, config }
    }

    /// Decide whether a call to `event` may proceed. `Ok(())` means admit
    /// (either the circuit is `CLOSED`, or it just transitioned into
    /// `HALF_OPEN` and this call consumes one of its probe slots). An
    /// `Err` is either [`Error::CircuitOpen`] or [`Error::HalfOpenLimit`];
    /// neither carries a decided fallback — that's the middleware layer's
    /// call, since only it knows whether the descriptor configured one.
    pub fn admit(&self, event: &str) -> Result<()> {
        let event = event.to_string();
        let config = self.config.clone();
        self.executor.execute("CIRCUIT_ADMIT", move |store, now| {
            let mut circuit = load(store, &event, now);
            match circuit.state {
                CircuitState::Closed => Ok(((), vec![])),
                CircuitState::Open => {
                    let backoff = backoff_ms(&config, circuit.open_attempts.max(1));
                    let opened_at = circuit.opened_at.unwrap_or(now);
                    if now - opened_at >= backoff {
                        circuit.state = CircuitState::HalfOpen;
                        circuit.allowed_in_half_open = 1;
                        let ops = vec![store_op(&event, &circuit)];
                        Ok(((), ops))
                    } else {
                        Err(Error::CircuitOpen {
                            event: event.clone(),
                            fallback_returned: false,
                        })
                    }
                }
                CircuitState::HalfOpen => {
                    if circuit.allowed_in_half_open < config.half_open_limit {
                        circuit.allowed_in_half_open += 1;
                        let ops = vec![store_op(&event, &circuit)];
                        Ok(((), ops))
                    } else {
                        Err(Error::HalfOpenLimit { event: event.clone() })
                    }
                }
            }
        })
    }

    /// Record the outcome of an admitted call and apply any resulting
    /// state transition.
    pub fn record_outcome(&self, event: &str, outcome: CallOutcome) -> Result<()> {
        let event = event.to_string();
        let config = self.config.clone();
        self.executor.execute("CIRCUIT_RECORD", move |store, now| {
            let mut circuit = load(store, &event, now);
            match (circuit.state, outcome) {
                (CircuitState::Closed, CallOutcome::Success) => {
                    circuit.failures = 0;
                }
                (CircuitState::Closed, CallOutcome::Failure(_)) => {
                    circuit.failures += 1;
                    if circuit.failures >= config.threshold {
                        circuit.state = CircuitState::Open;
                        circuit.opened_at = Some(now);
                        circuit.open_attempts += 1;
                        circuit.failures = 0;
                        circuit.allowed_in_half_open = 0;
                        tracing::warn!(event = %event, "circuit opened");
                    }
                }
                (CircuitState::HalfOpen, CallOutcome::Success) => {
                    circuit.successes += 1;
                    if circuit.successes >= config.success_threshold {
                        circuit = Circuit::default();
                        tracing::info!(event = %event, "circuit closed after recovery");
                    } else {
                        // Free the probe slot so the next admit() can send
                        // another probe; the cap is on concurrently
                        // in-flight probes, not cumulative probes ever sent.
                        circuit.allowed_in_half_open = 0;
                    }
                }
                (CircuitState::HalfOpen, CallOutcome::Failure(_)) => {
                    circuit.state = CircuitState::Open;
                    circuit.opened_at = Some(now);
                    circuit.open_attempts += 1;
                    circuit.successes = 0;
                    circuit.allowed_in_half_open = 0;
                    tracing::warn!(event = %event, "half-open probe failed, circuit re-opened");
                }
                (CircuitState::Open, _) => {
                    // Outcomes can't reach here: `admit` rejects every call
                    // while `Open`, so the body never ran.
                }
            }
            let ops = vec![store_op(&event, &circuit)];
            Ok(((), ops))
        })
    }

    /// Current state for `event`, for `system.health`/`system.get_state`.
    pub fn get(&self, event: &str) -> Circuit {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        load(&store, event, now)
    }
}
