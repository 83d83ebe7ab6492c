//! The keyed store itself.
//!
//! `Store` is a thin `RwLock` wrapper around [`StoreInner`]. Single-key
//! reads take a shared read lock; every multi-step atomic operation (the
//! handler set's "scripts") takes the exclusive write lock for its entire
//! validate-then-apply body, which is what makes the operation atomic —
//! no other reader or writer can observe an intermediate state. See
//! `claudebench-concurrency` for the validate/WAL-append/apply sequencing
//! built on top of [`Store::write_lock`].

use crate::op::StoreOp;
use crate::record::{Record, StreamEntry, ZScore};
use crate::ttl::TtlIndex;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;

/// The store's data, guarded as a unit by [`Store`].
#[derive(Debug, Default)]
pub struct StoreInner {
    records: BTreeMap<String, Record>,
    expires: BTreeMap<String, i64>,
    ttl_index: TtlIndex,
    zset_seq: u64,
}

impl StoreInner {
    fn record(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    /// Whether `key` has expired as of `now_ms` but has not yet been swept.
    pub fn is_expired(&self, key: &str, now_ms: i64) -> bool {
        matches!(self.expires.get(key), Some(exp) if *exp <= now_ms)
    }

    /// String value, or `None` if absent or expired.
    pub fn get_string(&self, key: &str, now_ms: i64) -> Option<&str> {
        if self.is_expired(key, now_ms) {
            return None;
        }
        match self.record(key) {
            Some(Record::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Remaining TTL in milliseconds, if the key carries an expiry.
    pub fn ttl_remaining_ms(&self, key: &str, now_ms: i64) -> Option<i64> {
        self.expires.get(key).map(|exp| (*exp - now_ms).max(0))
    }

    /// Single hash field.
    pub fn hash_get(&self, key: &str, field: &str) -> Option<&str> {
        match self.record(key) {
            Some(Record::Hash(map)) => map.get(field).map(|s| s.as_str()),
            _ => None,
        }
    }

    /// All fields of a hash.
    pub fn hash_get_all(&self, key: &str) -> Option<&std::collections::HashMap<String, String>> {
        match self.record(key) {
            Some(Record::Hash(map)) => Some(map),
            _ => None,
        }
    }

    /// Sorted-set members in ascending `(score, seq)` order, `limit` of
    /// them starting at `offset`.
    pub fn zset_range(&self, key: &str, offset: usize, limit: usize) -> Vec<(String, i64)> {
        match self.record(key) {
            Some(Record::ZSet { by_score, .. }) => by_score
                .iter()
                .skip(offset)
                .take(limit)
                .map(|(score, member)| (member.clone(), score.score))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Members whose score is `<= max_score`, ascending.
    pub fn zset_members_below(&self, key: &str, max_score: i64) -> Vec<String> {
        match self.record(key) {
            Some(Record::ZSet { by_score, .. }) => by_score
                .range(
                    ..=ZScore {
                        score: max_score,
                        seq: u64::MAX,
                    },
                )
                .map(|(_, member)| member.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of members in a sorted set.
    pub fn zset_card(&self, key: &str) -> usize {
        match self.record(key) {
            Some(Record::ZSet { by_member, .. }) => by_member.len(),
            _ => 0,
        }
    }

    /// Current score of a member, if present.
    pub fn zset_score(&self, key: &str, member: &str) -> Option<i64> {
        match self.record(key) {
            Some(Record::ZSet { by_member, .. }) => by_member.get(member).map(|z| z.score),
            _ => None,
        }
    }

    /// Allocate the next FIFO tie-break sequence for a sorted-set insert.
    pub fn next_zset_seq(&mut self) -> u64 {
        self.zset_seq += 1;
        self.zset_seq
    }

    /// Raise the FIFO tie-break counter so it never reissues a sequence
    /// already present in a replayed zset member. Called once after WAL
    /// recovery, before the store accepts new writes.
    pub fn resume_zset_seq_past(&mut self, floor: u64) {
        self.zset_seq = self.zset_seq.max(floor);
    }

    /// Highest `seq` currently held by any sorted-set member, across every
    /// key. Used by recovery to compute [`Self::resume_zset_seq_past`]'s
    /// argument without the durability crate reaching into private fields.
    pub fn max_zset_seq(&self) -> u64 {
        self.records
            .values()
            .filter_map(|r| match r {
                Record::ZSet { by_member, .. } => {
                    by_member.values().map(|z| z.seq).max()
                }
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// List contents in `[start, end]`, inclusive, clamped to bounds.
    pub fn list_range(&self, key: &str, start: usize, end: usize) -> Vec<String> {
        match self.record(key) {
            Some(Record::List(items)) => {
                let end = end.min(items.len().saturating_sub(1));
                if start > end || items.is_empty() {
                    return Vec::new();
                }
                items.iter().skip(start).take(end - start + 1).cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Stream entries with id `> after_id`, oldest first, at most `limit`.
    pub fn stream_range(&self, key: &str, after_id: u64, limit: usize) -> Vec<StreamEntry> {
        match self.record(key) {
            Some(Record::Stream { entries, .. }) => entries
                .iter()
                .filter(|e| e.id > after_id)
                .take(limit)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Total entries ever appended to a stream (its next id minus one).
    pub fn stream_len(&self, key: &str) -> u64 {
        match self.record(key) {
            Some(Record::Stream { next_id, .. }) => next_id.saturating_sub(1),
            _ => 0,
        }
    }

    /// Id that will be assigned to the next append.
    pub fn peek_next_stream_id(&self, key: &str) -> u64 {
        match self.record(key) {
            Some(Record::Stream { next_id, .. }) => *next_id,
            _ => 1,
        }
    }

    /// Unordered set members.
    pub fn set_members(&self, key: &str) -> Vec<String> {
        match self.record(key) {
            Some(Record::Set(members)) => members.iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `member` is present in a set.
    pub fn set_contains(&self, key: &str, member: &str) -> bool {
        match self.record(key) {
            Some(Record::Set(members)) => members.contains(member),
            _ => false,
        }
    }

    /// Keys whose string form starts with `prefix`.
    pub fn scan_prefix(&self, prefix: &str) -> Vec<String> {
        self.records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Whether any record (expired or not) exists at `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    fn set_expiry(&mut self, key: &str, expire_at_ms: Option<i64>) {
        if let Some(prev) = self.expires.remove(key) {
            self.ttl_index.remove(prev, key);
        }
        if let Some(exp) = expire_at_ms {
            self.expires.insert(key.to_string(), exp);
            self.ttl_index.insert(exp, key.to_string());
        }
    }

    fn clear_expiry(&mut self, key: &str) {
        self.set_expiry(key, None);
    }

    /// Apply a single physical mutation. Infallible: callers validate
    /// preconditions before producing ops, so application never fails.
    pub fn apply(&mut self, op: &StoreOp) {
        match op {
            StoreOp::SetString {
                key,
                value,
                expire_at_ms,
            } => {
                self.records.insert(key.clone(), Record::String(value.clone()));
                self.set_expiry(key, *expire_at_ms);
            }
            StoreOp::Delete { key } => {
                self.records.remove(key);
                self.clear_expiry(key);
            }
            StoreOp::IncrBy { key, delta } => {
                let current = match self.record(key) {
                    Some(Record::String(s)) => s.parse::<i64>().unwrap_or(0),
                    _ => 0,
                };
                self.records
                    .insert(key.clone(), Record::String((current + delta).to_string()));
            }
            StoreOp::HashSet { key, field, value } => {
                let entry = self
                    .records
                    .entry(key.clone())
                    .or_insert_with(|| Record::Hash(Default::default()));
                if let Record::Hash(map) = entry {
                    map.insert(field.clone(), value.clone());
                }
            }
            StoreOp::HashIncrBy { key, field, delta } => {
                let entry = self
                    .records
                    .entry(key.clone())
                    .or_insert_with(|| Record::Hash(Default::default()));
                if let Record::Hash(map) = entry {
                    let current = map.get(field).and_then(|v| v.parse::<i64>().ok()).unwrap_or(0);
                    map.insert(field.clone(), (current + delta).to_string());
                }
            }
            StoreOp::ZAdd {
                key,
                member,
                score,
                seq,
            } => {
                let entry = self.records.entry(key.clone()).or_insert_with(|| Record::ZSet {
                    by_score: BTreeMap::new(),
                    by_member: Default::default(),
                });
                if let Record::ZSet { by_score, by_member } = entry {
                    if let Some(old) = by_member.remove(member) {
                        by_score.remove(&old);
                    }
                    let zscore = ZScore {
                        score: *score,
                        seq: *seq,
                    };
                    by_score.insert(zscore, member.clone());
                    by_member.insert(member.clone(), zscore);
                }
            }
            StoreOp::ZRem { key, member } => {
                if let Some(Record::ZSet { by_score, by_member }) = self.records.get_mut(key) {
                    if let Some(old) = by_member.remove(member) {
                        by_score.remove(&old);
                    }
                }
            }
            StoreOp::ListPush { key, value, front } => {
                let entry = self
                    .records
                    .entry(key.clone())
                    .or_insert_with(|| Record::List(Default::default()));
                if let Record::List(items) = entry {
                    if *front {
                        items.push_front(value.clone());
                    } else {
                        items.push_back(value.clone());
                    }
                }
            }
            StoreOp::ListRemoveValue { key, value } => {
                if let Some(Record::List(items)) = self.records.get_mut(key) {
                    if let Some(pos) = items.iter().position(|v| v == value) {
                        items.remove(pos);
                    }
                }
            }
            StoreOp::ListTrim { key, start, end } => {
                if let Some(Record::List(items)) = self.records.get_mut(key) {
                    let len = items.len() as i64;
                    let start = (*start).max(0);
                    let end = (*end).min(len - 1);
                    let mut trimmed: std::collections::VecDeque<String> =
                        if start > end || items.is_empty() {
                            Default::default()
                        } else {
                            items
                                .iter()
                                .skip(start as usize)
                                .take((end - start + 1) as usize)
                                .cloned()
                                .collect()
                        };
                    std::mem::swap(items, &mut trimmed);
                }
            }
            StoreOp::StreamAppend { key, id, payload } => {
                let entry = self.records.entry(key.clone()).or_insert_with(|| Record::Stream {
                    entries: Default::default(),
                    next_id: 1,
                });
                if let Record::Stream { entries, next_id } = entry {
                    entries.push_back(StreamEntry {
                        id: *id,
                        payload: payload.clone(),
                    });
                    *next_id = (*next_id).max(id + 1);
                }
            }
            StoreOp::SetAdd { key, member } => {
                let entry = self
                    .records
                    .entry(key.clone())
                    .or_insert_with(|| Record::Set(Default::default()));
                if let Record::Set(members) = entry {
                    members.insert(member.clone());
                }
            }
            StoreOp::SetRemove { key, member } => {
                if let Some(Record::Set(members)) = self.records.get_mut(key) {
                    members.remove(member);
                }
            }
        }
    }

    /// Delete every key whose TTL has elapsed as of `now_ms`, returning
    /// the keys removed.
    pub fn sweep_expired(&mut self, now_ms: i64) -> Vec<String> {
        let keys = self.ttl_index.find_expired(now_ms);
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            self.records.remove(&key);
            self.expires.remove(&key);
            removed.push(key);
        }
        self.ttl_index.remove_expired(now_ms);
        removed
    }
}

/// Shared handle to the keyed store.
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<StoreInner>,
}

impl Store {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Acquire a shared read lock for single-step queries.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read()
    }

    /// Acquire the exclusive write lock. Holding it spans an entire
    /// validate-then-apply body, which is what gives atomic operations
    /// their atomicity.
    pub fn write_lock(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let store = Store::new();
        {
            let mut guard = store.write_lock();
            guard.apply(&StoreOp::SetString {
                key: "k".into(),
                value: "v".into(),
                expire_at_ms: None,
            });
        }
        assert_eq!(store.read_lock().get_string("k", 0), Some("v"));
    }

    #[test]
    fn expired_string_reads_as_absent() {
        let store = Store::new();
        {
            let mut guard = store.write_lock();
            guard.apply(&StoreOp::SetString {
                key: "k".into(),
                value: "v".into(),
                expire_at_ms: Some(100),
            });
        }
        assert_eq!(store.read_lock().get_string("k", 50), Some("v"));
        assert_eq!(store.read_lock().get_string("k", 150), None);
    }

    #[test]
    fn sweep_expired_removes_record_and_index_entry() {
        let store = Store::new();
        {
            let mut guard = store.write_lock();
            guard.apply(&StoreOp::SetString {
                key: "k".into(),
                value: "v".into(),
                expire_at_ms: Some(100),
            });
        }
        let removed = store.write_lock().sweep_expired(150);
        assert_eq!(removed, vec!["k".to_string()]);
        assert!(!store.read_lock().contains_key("k"));
    }

    #[test]
    fn zset_add_breaks_ties_by_insertion_order() {
        let store = Store::new();
        let mut guard = store.write_lock();
        let seq1 = guard.next_zset_seq();
        guard.apply(&StoreOp::ZAdd {
            key: "q".into(),
            member: "first".into(),
            score: 5,
            seq: seq1,
        });
        let seq2 = guard.next_zset_seq();
        guard.apply(&StoreOp::ZAdd {
            key: "q".into(),
            member: "second".into(),
            score: 5,
            seq: seq2,
        });
        let range = guard.zset_range("q", 0, 10);
        assert_eq!(range[0].0, "first");
        assert_eq!(range[1].0, "second");
    }

    #[test]
    fn stream_append_assigns_increasing_ids() {
        let store = Store::new();
        let mut guard = store.write_lock();
        let id1 = guard.peek_next_stream_id("s");
        guard.apply(&StoreOp::StreamAppend {
            key: "s".into(),
            id: id1,
            payload: serde_json::json!({"a": 1}),
        });
        let id2 = guard.peek_next_stream_id("s");
        assert_eq!(id2, id1 + 1);
    }
}
