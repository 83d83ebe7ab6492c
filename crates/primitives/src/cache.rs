//! Read-through response cache keyed by `(event, inputFingerprint)`,
//! backing the `cache` middleware layer. The fingerprint itself is an
//! `api`-layer concern (canonicalizing and hashing a JSON-RPC payload);
//! this facade only stores and retrieves the already-hashed entry.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::key::Key;
use claudebench_core::Result;
use claudebench_storage::StoreOp;

/// Read/write facade over `cb:cache:handler:<event>:<hash>`.
pub struct ResponseCache {
    executor: AtomicExecutor,
}

impl ResponseCache {
    /// Build a response cache over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self { executor }
    }

    /// Fetch a cached response body, if present and unexpired.
    pub fn get(&self, event: &str, input_hash: &str) -> Option<String> {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        store
            .get_string(Key::cache(event, input_hash).as_str(), now)
            .map(str::to_string)
    }

    /// Cache a successful response body for `ttl_ms`.
    pub fn set(&self, event: &str, input_hash: &str, body: String, ttl_ms: u64) -> Result<()> {
        let key = Key::cache(event, input_hash).as_str().to_string();
        self.executor.execute("CACHE_SET", move |_store, now| {
            Ok((
                (),
                vec![StoreOp::SetString {
                    key,
                    value: body,
                    expire_at_ms: Some(now + ttl_ms as i64),
                }],
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;
    use std::sync::Arc;

    #[test]
    fn set_then_get_round_trips_within_ttl() {
        let clock = Arc::new(TestClock::new(0));
        let cache = ResponseCache::new(AtomicExecutor::in_memory(clock.clone()));
        cache.set("task.create", "abc", "{\"id\":\"t-1\"}".into(), 1_000).unwrap();
        assert_eq!(cache.get("task.create", "abc"), Some("{\"id\":\"t-1\"}".to_string()));
        clock.advance(1_001);
        assert_eq!(cache.get("task.create", "abc"), None);
    }
}
