//! Expiry index for efficient TTL cleanup.
//!
//! Maps expiry timestamp -> set of keys expiring at that time using a
//! `BTreeMap` for sorted order, so sweeping expired keys is O(expired count)
//! rather than a scan of the whole store.

use std::collections::{BTreeMap, HashSet};

/// Expiry-timestamp-ordered index of keys carrying a TTL.
#[derive(Debug, Default)]
pub struct TtlIndex {
    index: BTreeMap<i64, HashSet<String>>,
}

impl TtlIndex {
    /// Construct an empty index.
    pub fn new() -> Self {
        Self {
            index: BTreeMap::new(),
        }
    }

    /// Record that `key` expires at `expiry_ms`.
    pub fn insert(&mut self, expiry_ms: i64, key: String) {
        self.index.entry(expiry_ms).or_default().insert(key);
    }

    /// Drop `key`'s entry at `expiry_ms`, e.g. on delete or TTL refresh.
    pub fn remove(&mut self, expiry_ms: i64, key: &str) {
        if let Some(keys) = self.index.get_mut(&expiry_ms) {
            keys.remove(key);
            if keys.is_empty() {
                self.index.remove(&expiry_ms);
            }
        }
    }

    /// All keys with an expiry timestamp at or before `now_ms`.
    pub fn find_expired(&self, now_ms: i64) -> Vec<String> {
        self.index
            .range(..=now_ms)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Drop every index entry at or before `now_ms`, returning the count
    /// removed. Callers must have already deleted the underlying records.
    pub fn remove_expired(&mut self, now_ms: i64) -> usize {
        let expired_ts: Vec<i64> = self.index.range(..=now_ms).map(|(ts, _)| *ts).collect();
        let mut count = 0;
        for ts in expired_ts {
            if let Some(keys) = self.index.remove(&ts) {
                count += keys.len();
            }
        }
        count
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total number of keys tracked.
    pub fn len(&self) -> usize {
        self.index.values().map(|keys| keys.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_keys_expired_at_or_before_now() {
        let mut index = TtlIndex::new();
        index.insert(500, "a".into());
        index.insert(500, "b".into());
        index.insert(1200, "c".into());

        let expired = index.find_expired(1000);
        assert_eq!(expired.len(), 2);
        assert!(!expired.iter().any(|k| k == "c"));
    }

    #[test]
    fn remove_drops_empty_timestamp_bucket() {
        let mut index = TtlIndex::new();
        index.insert(500, "a".into());
        index.remove(500, "a");
        assert!(index.is_empty());
    }

    #[test]
    fn remove_expired_clears_only_matching_entries() {
        let mut index = TtlIndex::new();
        index.insert(100, "a".into());
        index.insert(200, "b".into());
        let removed = index.remove_expired(150);
        assert_eq!(removed, 1);
        assert_eq!(index.len(), 1);
    }
}
