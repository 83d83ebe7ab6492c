//! Per-event call counts and latency percentiles, fed by the `measured`
//! middleware layer and read back by `system.metrics`.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::key::Key;
use claudebench_storage::StoreOp;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Bounds the reservoir kept per event, so a hot handler's latency history
/// doesn't grow without bound over a long-running process.
const RESERVOIR_CAP: usize = 256;

/// Snapshot of one event's call counters and latency distribution.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerMetrics {
    /// Event name, e.g. `task.create`.
    pub event: String,
    /// Total calls recorded.
    pub calls: u64,
    /// Calls that returned an error.
    pub errors: u64,
    /// 50th percentile latency, milliseconds.
    pub p50_ms: u64,
    /// 95th percentile latency, milliseconds.
    pub p95_ms: u64,
    /// 99th percentile latency, milliseconds.
    pub p99_ms: u64,
}

#[derive(Debug, Default)]
struct Reservoir {
    samples: Vec<u64>,
    calls: u64,
    errors: u64,
}

impl Reservoir {
    fn record(&mut self, latency_ms: u64, is_error: bool) {
        self.calls += 1;
        if is_error {
            self.errors += 1;
        }
        if self.samples.len() < RESERVOIR_CAP {
            self.samples.push(latency_ms);
        } else {
            // Reservoir sampling: replace a uniformly-chosen existing sample
            // so the reservoir stays representative of the whole history
            // rather than just the most recent `RESERVOIR_CAP` calls.
            let slot = (self.calls as usize) % RESERVOIR_CAP;
            self.samples[slot] = latency_ms;
        }
    }

    fn percentile(&self, p: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

/// Records latency/outcome per event and aggregates the response cache's
/// companion metrics, kept in-process (not in the KV store, since the
/// measured middleware runs on every call and a reservoir sample is not a
/// value the atomic-script/WAL machinery needs to protect).
#[derive(Clone)]
pub struct MetricsRecorder {
    executor: AtomicExecutor,
    reservoirs: Arc<Mutex<HashMap<String, Reservoir>>>,
}

impl MetricsRecorder {
    /// Build a metrics recorder over a shared executor. Recorders
    /// constructed from the same executor do *not* share reservoirs unless
    /// explicitly cloned — callers that need one recorder's data visible
    /// across the process (the dispatcher's measured middleware and
    /// `system.metrics`) must share a single instance, typically held by
    /// the engine and handed out by reference.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self {
            executor,
            reservoirs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record one completed call's outcome and latency. Also increments
    /// `cb:metrics:<event>:calls` in the durable store, so a cold-started
    /// process inherits prior call counts even though in-process latency
    /// history is lost on restart.
    pub fn record(&self, event: &str, latency_ms: u64, is_error: bool) {
        self.reservoirs
            .lock()
            .entry(event.to_string())
            .or_default()
            .record(latency_ms, is_error);
        let _ = self.executor.execute("RECORD_METRIC", {
            let event = event.to_string();
            move |_store, _now| {
                let ops = vec![StoreOp::IncrBy {
                    key: Key::metric(&format!("{}:calls", event)).as_str().to_string(),
                    delta: 1,
                }];
                Ok(((), ops))
            }
        });
    }

    /// Snapshot every event's current counters and percentiles.
    pub fn snapshot(&self) -> Vec<HandlerMetrics> {
        self.reservoirs
            .lock()
            .iter()
            .map(|(event, r)| HandlerMetrics {
                event: event.clone(),
                calls: r.calls,
                errors: r.errors,
                p50_ms: r.percentile(0.50),
                p95_ms: r.percentile(0.95),
                p99_ms: r.percentile(0.99),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;
    use std::sync::Arc as StdArc;

    fn recorder() -> MetricsRecorder {
        MetricsRecorder::new(AtomicExecutor::in_memory(StdArc::new(TestClock::new(0))))
    }

    #[test]
    fn records_calls_and_errors_per_event() {
        let m = recorder();
        m.record("task.create", 10, false);
        m.record("task.create", 20, false);
        m.record("task.create", 30, true);
        let snap = m.snapshot();
        let entry = snap.iter().find(|h| h.event == "task.create").unwrap();
        assert_eq!(entry.calls, 3);
        assert_eq!(entry.errors, 1);
    }

    #[test]
    fn percentiles_reflect_the_sample_distribution() {
        let m = recorder();
        for ms in [10, 20, 30, 40, 50] {
            m.record("task.claim", ms, false);
        }
        let snap = m.snapshot();
        let entry = snap.iter().find(|h| h.event == "task.claim").unwrap();
        assert_eq!(entry.p50_ms, 30);
        assert_eq!(entry.p99_ms, 50);
    }
}
