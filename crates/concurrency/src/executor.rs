//! The atomic script executor.

use claudebench_core::{Clock, Error, Result};
use claudebench_durability::{NullWalWriter, WalWriter};
use claudebench_storage::{Store, StoreInner, StoreOp};
use parking_lot::Mutex;
use std::sync::Arc;

/// Something that can durably record a committed script's op batch.
///
/// Implemented for [`WalWriter`] (real persistence) and [`NullWalWriter`]
/// (tests and ephemeral servers that opt out of crash recovery), so
/// [`AtomicExecutor`] doesn't need to special-case either.
pub trait ScriptLog: Send {
    /// Append one committed batch, returning its assigned sequence number.
    fn append(
        &mut self,
        script: &'static str,
        ops: Vec<StoreOp>,
        now_ms: i64,
    ) -> std::result::Result<u64, claudebench_durability::WalError>;
}

impl ScriptLog for WalWriter {
    fn append(
        &mut self,
        script: &'static str,
        ops: Vec<StoreOp>,
        now_ms: i64,
    ) -> std::result::Result<u64, claudebench_durability::WalError> {
        WalWriter::append(self, script, ops, now_ms)
    }
}

impl ScriptLog for NullWalWriter {
    fn append(
        &mut self,
        script: &'static str,
        ops: Vec<StoreOp>,
        now_ms: i64,
    ) -> std::result::Result<u64, claudebench_durability::WalError> {
        NullWalWriter::append(self, script, ops, now_ms)
    }
}

/// Runs named atomic scripts against the shared store, logging each
/// committed op batch before applying it.
///
/// Cloning is cheap (an `Arc` handle to the same store/log/clock) so every
/// facade in `claudebench-primitives` and every background sweeper in
/// `claudebench-engine` shares one executor, and therefore one lock, per
/// process — which is exactly the invariant §4.2 requires ("no interleaving
/// with any other script or read on the same keys").
#[derive(Clone)]
pub struct AtomicExecutor {
    store: Arc<Store>,
    log: Arc<Mutex<Box<dyn ScriptLog>>>,
    clock: Arc<dyn Clock>,
}

impl AtomicExecutor {
    /// Build an executor over an existing store (e.g. one rebuilt by
    /// [`claudebench_durability::recover`]) and log sink.
    pub fn new(store: Arc<Store>, log: Box<dyn ScriptLog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            log: Arc::new(Mutex::new(log)),
            clock,
        }
    }

    /// An executor over a fresh, empty store with no durability — for tests.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(Store::new()), Box::new(NullWalWriter::default()), clock)
    }

    /// The store this executor mutates. Read-only callers (e.g. `task.list`,
    /// `system.get_state`) may take a shared read lock directly rather than
    /// going through [`Self::execute`].
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Current time from the injected clock, for callers that need `now`
    /// outside a script body (e.g. middleware).
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Run one atomic script.
    ///
    /// `body` is handed a mutable reference to the store's guarded state and
    /// the current time, under the store's exclusive write lock. It returns
    /// the caller-visible result plus the physical ops that must be applied;
    /// returning `Err` aborts with no side effects — `body` must not mutate
    /// anything observable before deciding the op batch (the `next_zset_seq`
    /// FIFO counter is the one exception: it is a monotonic allocator, not a
    /// keyspace mutation, and is safe to advance even on a path that later
    /// errors, since sequence gaps are harmless).
    pub fn execute<T>(
        &self,
        script: &'static str,
        body: impl FnOnce(&mut StoreInner, i64) -> Result<(T, Vec<StoreOp>)>,
    ) -> Result<T> {
        let now = self.clock.now_millis();
        let mut guard = self.store.write_lock();
        let (value, ops) = body(&mut guard, now)?;
        if !ops.is_empty() {
            self.log
                .lock()
                .append(script, ops.clone(), now)
                .map_err(Error::from)?;
            for op in &ops {
                guard.apply(op);
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;

    #[test]
    fn failed_script_applies_no_ops() {
        let executor = AtomicExecutor::in_memory(Arc::new(TestClock::new(0)));
        let result: Result<()> = executor.execute("NOOP", |_store, _now| {
            Err(Error::Conflict {
                message: "already exists".into(),
            })
        });
        assert!(result.is_err());
        assert!(!executor.store().read_lock().contains_key("cb:task:t-1"));
    }

    #[test]
    fn successful_script_applies_ops_and_returns_value() {
        let executor = AtomicExecutor::in_memory(Arc::new(TestClock::new(0)));
        let id: String = executor
            .execute("TASK_CREATE", |_store, _now| {
                Ok((
                    "t-1".to_string(),
                    vec![StoreOp::SetString {
                        key: "cb:task:t-1".into(),
                        value: "pending".into(),
                        expire_at_ms: None,
                    }],
                ))
            })
            .unwrap();
        assert_eq!(id, "t-1");
        assert_eq!(
            executor.store().read_lock().get_string("cb:task:t-1", 0),
            Some("pending")
        );
    }
}
