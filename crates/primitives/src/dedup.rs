//! `EXACTLY_ONCE_DELIVERY`: event-id dedup for at-least-once transports.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::ids::EventId;
use claudebench_core::key::Key;
use claudebench_core::Result;
use claudebench_storage::StoreOp;

/// Tracks which event ids have already been processed, so a redelivered
/// event is dropped rather than re-applied.
pub struct Deduplicator {
    executor: AtomicExecutor,
}

impl Deduplicator {
    /// Build a deduplicator over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self { executor }
    }

    /// `EXACTLY_ONCE_DELIVERY(eventId)`. Returns `true` if this is the
    /// first time `event_id` has been seen (the caller should proceed),
    /// `false` if it is a duplicate (the caller should drop it silently).
    /// Every call past the first increments `cb:duplicates:prevented`.
    pub fn admit(&self, event_id: &EventId) -> Result<bool> {
        let event_id = event_id.clone();
        self.executor.execute("EXACTLY_ONCE_DELIVERY", move |store, _now| {
            let already_seen = store.set_contains(Key::processed_events().as_str(), &event_id.0);
            if already_seen {
                let ops = vec![StoreOp::IncrBy {
                    key: Key::duplicates_prevented().as_str().to_string(),
                    delta: 1,
                }];
                return Ok((false, ops));
            }
            let ops = vec![StoreOp::SetAdd {
                key: Key::processed_events().as_str().to_string(),
                member: event_id.0.clone(),
            }];
            Ok((true, ops))
        })
    }

    /// Count of duplicates dropped so far, for `system.metrics`.
    pub fn duplicates_prevented(&self) -> i64 {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        store
            .get_string(Key::duplicates_prevented().as_str(), now)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }
}
