//! End-to-end dispatch scenarios exercising the full middleware envelope
//! (rate-limit -> timeout -> circuit-breaker -> cache -> audit -> measured
//! -> handler body) rather than any single facade in isolation.

use claudebench::{ClaudeBench, ClaudeBenchConfig};
use claudebench_api::{handlers, Context, Dispatcher, HandlerDescriptor, Registry};
use claudebench_concurrency::AtomicExecutor;
use claudebench_core::circuit::CircuitState;
use claudebench_core::clock::TestClock;
use claudebench_core::Result;
use claudebench_engine::Services;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A dispatcher wired over a manually constructed `Services`, so tests can
/// drive its injected clock directly — `Engine::boot` always runs a real
/// `SystemClock` with no seam for a test double.
fn test_dispatcher() -> (Dispatcher, Arc<TestClock>) {
    let clock = Arc::new(TestClock::new(0));
    let executor = AtomicExecutor::in_memory(clock.clone());
    let services = Services::new(executor, ClaudeBenchConfig::default());
    let registry = Registry::new();
    handlers::register_all(&registry).unwrap();
    (Dispatcher::new(registry, services), clock)
}

/// Registers a handler that fails its first `fail_count` invocations, then
/// always succeeds — enough to drive a circuit through open/half-open/closed
/// without depending on any real handler's own failure modes.
fn register_flaky(registry: &Registry, event: &'static str, fail_count: usize) {
    let attempts = Arc::new(AtomicUsize::new(0));
    registry
        .register(
            HandlerDescriptor::new(event, "fails its first N calls, then succeeds"),
            move |_ctx: &Context, _input: serde_json::Value| -> Result<serde_json::Value> {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < fail_count {
                    Err(claudebench_core::Error::Internal("synthetic failure".into()))
                } else {
                    Ok(json!({"ok": true}))
                }
            },
        )
        .unwrap();
}

fn register_noop(registry: &Registry, event: &'static str) {
    registry
        .register(
            HandlerDescriptor::new(event, "always succeeds, no side effects"),
            |_ctx: &Context, _input: serde_json::Value| -> Result<serde_json::Value> {
                Ok(json!({"ok": true}))
            },
        )
        .unwrap();
}

/// S1: a task's full happy-path lifecycle, plus the guard against
/// re-completing an already-completed task.
#[test]
fn s1_create_claim_complete_round_trip() {
    let bench = ClaudeBench::boot(ClaudeBenchConfig::default(), None).unwrap();

    bench
        .dispatch("system.register", json!({"id": "w-1", "roles": ["worker"]}), None)
        .unwrap();

    let created = bench
        .dispatch("task.create", json!({"text": "Write tests", "priority": 75}), None)
        .unwrap();
    assert_eq!(created["id"], "t-1");
    assert_eq!(created["status"], "pending");
    assert_eq!(created["priority"], 75);

    let claimed = bench
        .dispatch("task.claim", json!({"workerId": "w-1"}), Some("w-1".to_string()))
        .unwrap();
    assert_eq!(claimed["claimed"], true);
    assert_eq!(claimed["taskId"], "t-1");
    assert_eq!(claimed["task"]["status"], "in_progress");

    let completed = bench
        .dispatch("task.complete", json!({"id": "t-1", "result": {"ok": true}}), None)
        .unwrap();
    assert_eq!(completed["id"], "t-1");
    assert_eq!(completed["status"], "completed");

    let err = bench
        .dispatch("task.complete", json!({"id": "t-1", "result": {"ok": true}}), None)
        .unwrap_err();
    assert_eq!(err.json_rpc_code(), -32603);
}

/// S2: five failures open the circuit, the sixth call is rejected outright,
/// and three successive half-open probe successes close it back up.
#[test]
fn s2_circuit_opens_then_recovers_after_backoff() {
    let (dispatcher, clock) = test_dispatcher();
    register_flaky(dispatcher.registry(), "test.flaky", 5);

    for _ in 0..5 {
        let err = dispatcher.dispatch("test.flaky", json!({}), None).unwrap_err();
        assert_eq!(err.json_rpc_code(), -32603);
    }

    let sixth = dispatcher.dispatch("test.flaky", json!({}), None).unwrap_err();
    assert_eq!(sixth.json_rpc_code(), -32001);
    assert_eq!(dispatcher.services().circuits.get("test.flaky").state, CircuitState::Open);

    // Default base_timeout_ms is 30_000 at multiplier 1 (first open).
    clock.advance(30_000);

    for _ in 0..3 {
        let ok = dispatcher.dispatch("test.flaky", json!({}), None).unwrap();
        assert_eq!(ok["ok"], true);
    }
    assert_eq!(dispatcher.services().circuits.get("test.flaky").state, CircuitState::Closed);
}

/// S3: the sliding window admits exactly `limit` calls per window and
/// rejects the rest, then releases capacity once the window ages out.
#[test]
fn s3_rate_limit_admits_exactly_the_configured_window() {
    let (dispatcher, clock) = test_dispatcher();
    register_noop(dispatcher.registry(), "test.ping");

    let mut admitted = 0;
    let mut rejected = 0;
    for _ in 0..120 {
        match dispatcher.dispatch("test.ping", json!({}), Some("actor-1".to_string())) {
            Ok(_) => admitted += 1,
            Err(err) => {
                assert_eq!(err.json_rpc_code(), -32000);
                rejected += 1;
            }
        }
    }
    assert_eq!(admitted, 100);
    assert_eq!(rejected, 20);

    // Still within the window: no further capacity.
    assert!(dispatcher
        .dispatch("test.ping", json!({}), Some("actor-1".to_string()))
        .is_err());

    clock.advance(1_001);
    assert!(dispatcher
        .dispatch("test.ping", json!({}), Some("actor-1".to_string()))
        .is_ok());
}

/// S4: a worker that stops heartbeating loses its in-progress tasks back to
/// `pending` once its TTL lapses, and they're reclaimed in original
/// priority order by whoever claims next.
#[test]
fn s4_dead_worker_tasks_are_rescued_in_priority_order() {
    let (dispatcher, clock) = test_dispatcher();

    dispatcher
        .dispatch("system.register", json!({"id": "w-1", "roles": ["worker"]}), None)
        .unwrap();

    dispatcher
        .dispatch("task.create", json!({"text": "high priority", "priority": 80}), None)
        .unwrap();
    dispatcher
        .dispatch("task.create", json!({"text": "low priority", "priority": 50}), None)
        .unwrap();

    let claimed = dispatcher
        .dispatch("task.claim", json!({"workerId": "w-1", "maxTasks": 2}), Some("w-1".to_string()))
        .unwrap();
    assert_eq!(claimed["claimedCount"], 2);

    // w-1 never heartbeats again; advance past ttl_ms (30_000) plus one
    // sweep interval (5_000) and manually run the liveness sweep a real
    // `Engine` would run on a background thread.
    let ttl_ms = ClaudeBenchConfig::default().instance.ttl_ms;
    let sweep_interval_ms = ClaudeBenchConfig::default().instance.sweep_interval_ms;
    clock.advance(ttl_ms + sweep_interval_ms + 1);
    let reassigned = dispatcher.services().instances.reassign_failed_tasks().unwrap();
    assert_eq!(reassigned.len(), 2);

    dispatcher
        .dispatch("system.register", json!({"id": "w-2", "roles": ["worker"]}), None)
        .unwrap();

    let first = dispatcher
        .dispatch("task.claim", json!({"workerId": "w-2"}), Some("w-2".to_string()))
        .unwrap();
    assert_eq!(first["task"]["priority"], 80);

    let second = dispatcher
        .dispatch("task.claim", json!({"workerId": "w-2"}), Some("w-2".to_string()))
        .unwrap();
    assert_eq!(second["task"]["priority"], 50);
}

/// S5: a decision latches on the first strict majority and never changes,
/// even when later votes disagree.
#[test]
fn s5_quorum_latches_and_ignores_later_dissent() {
    let bench = ClaudeBench::boot(ClaudeBenchConfig::default(), None).unwrap();

    let after_a = bench
        .dispatch(
            "system.quorum.vote",
            json!({"voterId": "a", "decision": "d-1", "value": "A", "totalInstances": 3}),
            None,
        )
        .unwrap();
    assert_eq!(after_a["quorumReached"], false);

    let after_b = bench
        .dispatch(
            "system.quorum.vote",
            json!({"voterId": "b", "decision": "d-1", "value": "A", "totalInstances": 3}),
            None,
        )
        .unwrap();
    assert_eq!(after_b["quorumReached"], true);
    assert_eq!(after_b["finalDecision"], "A");

    let after_c = bench
        .dispatch(
            "system.quorum.vote",
            json!({"voterId": "c", "decision": "d-1", "value": "B", "totalInstances": 3}),
            None,
        )
        .unwrap();
    assert_eq!(after_c["finalDecision"], "A");
}

/// S6: validation failures are never charged against the circuit breaker —
/// a run of nothing but invalid input must leave the circuit `CLOSED` with
/// a zero failure count.
#[test]
fn s6_invalid_input_never_trips_the_circuit() {
    let bench = ClaudeBench::boot(ClaudeBenchConfig::default(), None).unwrap();

    for _ in 0..10 {
        let err = bench.dispatch("task.create", json!({"text": ""}), None).unwrap_err();
        assert_eq!(err.json_rpc_code(), -32602);
    }

    let circuit = bench.services().circuits.get("task.create");
    assert_eq!(circuit.state, CircuitState::Closed);
    assert_eq!(circuit.failures, 0);
}
