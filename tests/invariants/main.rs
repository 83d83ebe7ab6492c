//! The nine universal invariants of §8, each driven as a quantified
//! property against the facades directly (as opposed to
//! `tests/dispatch_scenarios`, which drives the concrete S1-S6 scenarios
//! through the full dispatcher + middleware envelope).

use claudebench_core::circuit::CircuitState;
use claudebench_core::clock::TestClock;
use claudebench_core::config::{CircuitConfig, RateLimitConfig};
use claudebench_core::ids::{EventId, InstanceId};
use claudebench_core::task::TaskStatus;
use claudebench_concurrency::AtomicExecutor;
use claudebench_primitives::{
    CallOutcome, CircuitTracker, Deduplicator, InstanceManager, QuorumTracker, RateLimiter,
    TaskQueue,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn executor(start_ms: i64) -> (AtomicExecutor, Arc<TestClock>) {
    let clock = Arc::new(TestClock::new(start_ms));
    (AtomicExecutor::in_memory(clock.clone()), clock)
}

/// I1: no double claim. For any number of pending tasks claimed by any
/// number of workers, every task id is claimed by exactly one worker, and
/// that worker's claimed list is the only one containing it.
proptest! {
    #[test]
    fn i1_no_double_claim(n_tasks in 1usize..20, n_workers in 1usize..8) {
        let (executor, _clock) = executor(0);
        let queue = TaskQueue::new(executor);
        for i in 0..n_tasks {
            queue.create(format!("task-{i}"), 50, Default::default()).unwrap();
        }
        let workers: Vec<InstanceId> = (0..n_workers).map(|i| InstanceId::from(format!("w-{i}"))).collect();

        let mut claimed_by: std::collections::HashMap<String, InstanceId> = std::collections::HashMap::new();
        loop {
            let mut any_claimed = false;
            for w in &workers {
                if let Some(task) = queue.claim(w).unwrap() {
                    prop_assert!(
                        !claimed_by.contains_key(task.id.as_str()),
                        "task {} claimed twice",
                        task.id
                    );
                    prop_assert_eq!(task.assigned_to.as_ref(), Some(w));
                    claimed_by.insert(task.id.as_str().to_string(), w.clone());
                    any_claimed = true;
                }
            }
            if !any_claimed {
                break;
            }
        }
        prop_assert_eq!(claimed_by.len(), n_tasks);
    }
}

/// I2: status monotonicity. Any sequence of `create -> claim -> complete`
/// (or `reassign` back to pending) only ever visits legal DAG edges; an
/// out-of-order call (completing a still-pending task, or double-completing)
/// is rejected rather than silently applied.
#[test]
fn i2_status_transitions_only_follow_the_documented_dag() {
    let (executor, _clock) = executor(0);
    let queue = TaskQueue::new(executor);
    let worker = InstanceId::from("w-1");

    let task = queue.create("x".into(), 50, Default::default()).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);

    // Completing a pending (unclaimed) task is illegal.
    assert!(queue.complete(&task.id, Some(serde_json::json!({}).into())).is_err());

    let claimed = queue.claim(&worker).unwrap().unwrap();
    assert_eq!(claimed.status, TaskStatus::InProgress);

    let completed = queue
        .complete(&task.id, Some(claudebench_core::value::Value::Bool(true)))
        .unwrap();
    assert_eq!(completed.status, TaskStatus::Completed);

    // Double-complete is illegal.
    assert!(queue
        .complete(&task.id, Some(claudebench_core::value::Value::Bool(true)))
        .is_err());

    // Reassign is the one documented escape hatch back to pending, but
    // only from in_progress.
    let task2 = queue.create("y".into(), 50, Default::default()).unwrap();
    queue.claim(&worker).unwrap();
    let reassigned = queue.reassign(&task2.id, None, "worker died".into()).unwrap();
    assert_eq!(reassigned.status, TaskStatus::Pending);
}

/// I3: exactly-once dedup. The first delivery of any event id is admitted;
/// every subsequent delivery of that same id is flagged as a duplicate, and
/// the duplicate counter increases by exactly one per repeat.
proptest! {
    #[test]
    fn i3_exactly_once_dedup(id in "[a-z]{1,12}", repeats in 1usize..10) {
        let (executor, _clock) = executor(0);
        let dedup = Deduplicator::new(executor);
        let event_id = EventId(id);

        prop_assert!(dedup.admit(&event_id).unwrap());
        for i in 0..repeats {
            prop_assert!(!dedup.admit(&event_id).unwrap());
            prop_assert_eq!(dedup.duplicates_prevented(), (i + 1) as i64);
        }
    }
}

/// I4: rate-limit correctness. For any `limit`/`window_ms` and any burst of
/// calls fired within one window, the number of admitted calls never
/// exceeds `limit`.
proptest! {
    #[test]
    fn i4_rate_limit_never_admits_more_than_the_configured_limit(
        limit in 1u32..50,
        attempts in 1u32..200,
    ) {
        let (executor, _clock) = executor(0);
        let config = RateLimitConfig {
            limit,
            window_ms: 1_000,
            skip_successful_requests: false,
            skip_failed_requests: false,
        };
        let rl = RateLimiter::new(executor, config);
        let mut admitted = 0u32;
        for _ in 0..attempts {
            if rl.check("event", "actor").is_ok() {
                rl.record("event", "actor", true).unwrap();
                admitted += 1;
            }
        }
        prop_assert!(admitted <= limit);
    }
}

/// I5: circuit convergence. From `HALF_OPEN`, `success_threshold`
/// consecutive successes close the circuit, and it stays `CLOSED` until a
/// failure burst of size `>= threshold` reopens it.
#[test]
fn i5_circuit_converges_to_closed_after_half_open_recovers() {
    let (executor, clock) = executor(0);
    let config = CircuitConfig {
        threshold: 4,
        base_timeout_ms: 10_000,
        multiplier: 2.0,
        success_threshold: 2,
        half_open_limit: 1,
    };
    let circuit = CircuitTracker::new(executor, config.clone());

    for _ in 0..4 {
        circuit.admit("ev").unwrap();
        circuit
            .record_outcome("ev", CallOutcome::Failure(claudebench_core::error::FailureKind::Error))
            .unwrap();
    }
    assert_eq!(circuit.get("ev").state, CircuitState::Open);

    clock.advance(config.base_timeout_ms as i64);
    for _ in 0..2 {
        circuit.admit("ev").unwrap();
        circuit.record_outcome("ev", CallOutcome::Success).unwrap();
    }
    assert_eq!(circuit.get("ev").state, CircuitState::Closed);

    // Stays closed under isolated successes/failures below threshold.
    circuit.admit("ev").unwrap();
    circuit
        .record_outcome("ev", CallOutcome::Failure(claudebench_core::error::FailureKind::Error))
        .unwrap();
    assert_eq!(circuit.get("ev").state, CircuitState::Closed);

    // A fresh burst of size >= threshold reopens it.
    for _ in 0..3 {
        circuit.admit("ev").unwrap();
        circuit
            .record_outcome("ev", CallOutcome::Failure(claudebench_core::error::FailureKind::Error))
            .unwrap();
    }
    assert_eq!(circuit.get("ev").state, CircuitState::Open);
}

/// I6: validation never trips the circuit. The dispatcher admits every
/// call through the circuit breaker before validating input (per §4.4), but
/// only calls `record_outcome` for the handler body's own success/failure —
/// an `InvalidInput` rejection (`tests/dispatch_scenarios`'s S6) never
/// reaches `record_outcome` at all. Here we pin the facade-level half: any
/// number of admits with no matching `record_outcome` call leave the
/// circuit's failure count at zero and its state `CLOSED`.
proptest! {
    #[test]
    fn i6_admits_without_a_recorded_outcome_never_move_the_circuit(n in 1usize..50) {
        let (executor, _clock) = executor(0);
        let circuit = CircuitTracker::new(executor, CircuitConfig::default());
        for _ in 0..n {
            circuit.admit("task.create").unwrap();
        }
        let state = circuit.get("task.create");
        prop_assert_eq!(state.state, CircuitState::Closed);
        prop_assert_eq!(state.failures, 0);
    }
}

/// I7: heartbeat liveness. While heartbeats arrive faster than `ttl`, the
/// instance record stays present; once they stop, the record disappears by
/// `ttl` after the last heartbeat, and any in-progress task it held is
/// requeued by the next `reassign_failed_tasks` sweep.
#[test]
fn i7_heartbeat_liveness_and_post_expiry_requeue() {
    let (executor, clock) = executor(0);
    let mgr = InstanceManager::new(executor.clone());
    let queue = TaskQueue::new(executor);
    let worker = InstanceId::from("w-1");
    let ttl_ms = 10_000u64;

    mgr.register(worker.clone(), HashSet::from(["worker".to_string()]), ttl_ms)
        .unwrap();
    let task = queue.create("x".into(), 50, Default::default()).unwrap();
    queue.claim(&worker).unwrap();

    // Heartbeat cadence well under ttl/2 keeps the record alive indefinitely.
    for _ in 0..5 {
        clock.advance((ttl_ms / 4) as i64);
        mgr.heartbeat(&worker).unwrap();
        assert!(mgr.get(&worker).is_ok());
    }

    // Heartbeats stop; once ttl has elapsed since the last one, the record
    // is gone and a sweep requeues its in-progress task.
    clock.advance(ttl_ms as i64 + 1);
    assert!(mgr.get(&worker).is_err());
    let reassigned = mgr.reassign_failed_tasks().unwrap();
    assert_eq!(reassigned, vec![task.id.clone()]);
    assert_eq!(queue.get(&task.id).unwrap().status, TaskStatus::Pending);
}

/// I8: priority order. A quiescent queue populated with descending
/// priorities yields claims in that same descending order, ties broken
/// FIFO by insertion.
proptest! {
    #[test]
    fn i8_claims_follow_priority_then_insertion_order(
        mut priorities in prop::collection::vec(0u8..=100, 1..30),
    ) {
        let (executor, _clock) = executor(0);
        let queue = TaskQueue::new(executor);
        let worker = InstanceId::from("w-1");

        let mut expected: Vec<(u8, usize)> = priorities.iter().cloned().enumerate().map(|(i, p)| (p, i)).collect();
        // Stable sort: descending priority, ties keep original (FIFO) order.
        expected.sort_by(|a, b| b.0.cmp(&a.0));

        for p in priorities.drain(..) {
            queue.create(format!("t-{p}"), p, Default::default()).unwrap();
        }

        let mut claim_order = Vec::new();
        while let Some(task) = queue.claim(&worker).unwrap() {
            claim_order.push(task.priority);
        }

        let expected_priorities: Vec<u8> = expected.into_iter().map(|(p, _)| p).collect();
        prop_assert_eq!(claim_order, expected_priorities);
    }
}

/// I9: quorum safety. Once a decision latches, no later vote — for or
/// against the latched value — ever changes `finalDecision`.
proptest! {
    #[test]
    fn i9_quorum_decision_never_changes_once_latched(
        total in 3u32..12,
        extra_votes in prop::collection::vec("[a-c]", 0..10),
    ) {
        let (executor, _clock) = executor(0);
        let quorum = QuorumTracker::new(executor);
        let majority = total / 2 + 1;

        let mut decided_at = None;
        for i in 0..total {
            let voter = InstanceId::from(format!("voter-{i}"));
            let value = if i < majority { "A" } else { "B" };
            let decision = quorum.vote("d-1", &voter, value, total).unwrap();
            if decision.decided.is_some() && decided_at.is_none() {
                decided_at = Some(decision.decided.clone());
                prop_assert_eq!(decision.decided.as_deref(), Some("A"));
            }
        }
        prop_assert!(decided_at.is_some());

        for (i, value) in extra_votes.iter().enumerate() {
            let voter = InstanceId::from(format!("extra-{i}"));
            let decision = quorum.vote("d-1", &voter, value, total).unwrap();
            prop_assert_eq!(decision.decided.as_deref(), Some("A"));
        }
    }
}
