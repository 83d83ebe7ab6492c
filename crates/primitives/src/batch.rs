//! `COORDINATE_BATCH`: a TTL-bounded lock plus shared progress counter for
//! coordinating a multi-instance batch of work.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::ids::InstanceId;
use claudebench_core::key::Key;
use claudebench_core::{Error, Result};
use claudebench_storage::StoreOp;
use serde::{Deserialize, Serialize};

/// Lock + progress state for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchState {
    /// Instance currently coordinating the batch, if the lock is held.
    pub lock_holder: Option<InstanceId>,
    /// Items completed so far.
    pub progress: u32,
    /// Total items in the batch.
    pub total: u32,
}

impl BatchState {
    /// Whether every item has been accounted for.
    pub fn is_complete(&self) -> bool {
        self.progress >= self.total
    }
}

/// Facade over the `cb:batch:<id>` keyspace.
pub struct BatchCoordinator {
    executor: AtomicExecutor,
}

impl BatchCoordinator {
    /// Build a batch coordinator over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self { executor }
    }

    /// `COORDINATE_BATCH(batchId, instanceId, total, lockTtlMs)`. Acquires
    /// the batch's coordination lock if free or already held by
    /// `instance_id`; refuses otherwise. `total` is only honored the first
    /// time a batch is seen, matching [`crate::QuorumTracker`]'s
    /// open-once-then-latch-parameters convention.
    pub fn acquire(
        &self,
        batch_id: &str,
        instance_id: &InstanceId,
        total: u32,
        lock_ttl_ms: i64,
    ) -> Result<BatchState> {
        let batch_id = batch_id.to_string();
        let instance_id = instance_id.clone();
        self.executor.execute("COORDINATE_BATCH", move |store, now| {
            let key = Key::batch(&batch_id).as_str().to_string();
            let lock_key = format!("{}:lock", key);
            let held_by = store.get_string(&lock_key, now).map(str::to_string);
            if let Some(holder) = &held_by {
                if holder.as_str() != instance_id.as_str() {
                    return Err(Error::Conflict {
                        message: format!("batch {} locked by {}", batch_id, holder),
                    });
                }
            }
            let mut state: BatchState = store
                .get_string(&key, now)
                .and_then(|raw| serde_json::from_str(raw).ok())
                .unwrap_or(BatchState {
                    lock_holder: None,
                    progress: 0,
                    total,
                });
            state.lock_holder = Some(instance_id.clone());
            let ops = vec![
                StoreOp::SetString {
                    key: lock_key,
                    value: instance_id.as_str().to_string(),
                    expire_at_ms: Some(now + lock_ttl_ms),
                },
                StoreOp::SetString {
                    key,
                    value: serde_json::to_string(&state)?,
                    expire_at_ms: None,
                },
            ];
            Ok((state, ops))
        })
    }

    /// Record `delta` items completed. Releases the lock once the batch is
    /// fully accounted for, so the next batch with the same id can start
    /// clean.
    pub fn advance(&self, batch_id: &str, instance_id: &InstanceId, delta: u32) -> Result<BatchState> {
        let batch_id = batch_id.to_string();
        let instance_id = instance_id.clone();
        self.executor.execute("COORDINATE_BATCH", move |store, now| {
            let key = Key::batch(&batch_id).as_str().to_string();
            let lock_key = format!("{}:lock", key);
            if store.get_string(&lock_key, now) != Some(instance_id.as_str()) {
                return Err(Error::PreconditionFailed {
                    message: format!("{} does not hold the lock for batch {}", instance_id, batch_id),
                });
            }
            let mut state: BatchState = store
                .get_string(&key, now)
                .and_then(|raw| serde_json::from_str(raw).ok())
                .ok_or(Error::NotFound {
                    entity: "batch",
                    id: batch_id.clone(),
                })?;
            state.progress = (state.progress + delta).min(state.total);
            let completed = state.is_complete();
            if completed {
                state.lock_holder = None;
            }
            let mut ops = vec![StoreOp::SetString {
                key,
                value: serde_json::to_string(&state)?,
                expire_at_ms: None,
            }];
            if completed {
                ops.push(StoreOp::Delete { key: lock_key });
            }
            Ok((state, ops))
        })
    }

    /// Current state of a batch, if it has been touched at all.
    pub fn get(&self, batch_id: &str) -> Option<BatchState> {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        store
            .get_string(Key::batch(batch_id).as_str(), now)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;
    use std::sync::Arc;

    fn coordinator() -> BatchCoordinator {
        BatchCoordinator::new(AtomicExecutor::in_memory(Arc::new(TestClock::new(0))))
    }

    #[test]
    fn second_instance_cannot_acquire_held_lock() {
        let b = coordinator();
        b.acquire("batch-1", &InstanceId::from("a"), 10, 5_000).unwrap();
        let err = b
            .acquire("batch-1", &InstanceId::from("b"), 10, 5_000)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn advance_completes_and_releases_lock() {
        let b = coordinator();
        let a = InstanceId::from("a");
        b.acquire("batch-1", &a, 2, 5_000).unwrap();
        b.advance("batch-1", &a, 1).unwrap();
        let state = b.advance("batch-1", &a, 1).unwrap();
        assert!(state.is_complete());

        let reacquired = b.acquire("batch-1", &InstanceId::from("b"), 2, 5_000);
        assert!(reacquired.is_ok());
    }

    #[test]
    fn advance_without_lock_is_rejected() {
        let b = coordinator();
        let err = b
            .advance("batch-1", &InstanceId::from("a"), 1)
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }
}
