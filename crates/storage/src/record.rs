//! Shapes a single key can hold.
//!
//! The handler set needs a handful of Redis-like shapes (string, hash,
//! sorted set, list, stream, set) rather than a single opaque blob, so a
//! key's value is one of a fixed set of variants rather than raw bytes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// A single appended stream entry (`XADD`-style), id assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// Monotonically increasing id, unique within the stream's key.
    pub id: u64,
    /// Opaque JSON payload for the entry.
    pub payload: serde_json::Value,
}

/// Sorted-set member ordered by `(score, insertion_seq)` so ties break FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZScore {
    /// Caller-assigned score (e.g. task priority).
    pub score: i64,
    /// Tie-break: order of insertion, assigned by the store.
    pub seq: u64,
}

/// The value stored under a single key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Record {
    /// No value stored (used only as a transient placeholder; never
    /// persisted as-is).
    #[default]
    None,
    /// A plain string, e.g. a cached response body or a lease marker.
    String(String),
    /// Field -> value map, e.g. a task's hash record.
    Hash(HashMap<String, String>),
    /// Score-ordered set of members, e.g. the pending task queue.
    ZSet {
        /// score/seq -> member, kept sorted for range queries.
        by_score: BTreeMap<ZScore, String>,
        /// member -> score/seq, for O(log n) removal and re-scoring.
        by_member: HashMap<String, ZScore>,
    },
    /// An ordered sequence, e.g. a per-instance dispatch log.
    List(VecDeque<String>),
    /// An append-only sequence of entries with an assigned next id.
    Stream {
        /// Entries in append order.
        entries: VecDeque<StreamEntry>,
        /// Next id to assign on append.
        next_id: u64,
    },
    /// An unordered unique collection, e.g. processed-event dedup.
    Set(HashSet<String>),
}

impl Record {
    /// Short tag for error messages and tracing fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::None => "none",
            Record::String(_) => "string",
            Record::Hash(_) => "hash",
            Record::ZSet { .. } => "zset",
            Record::List(_) => "list",
            Record::Stream { .. } => "stream",
            Record::Set(_) => "set",
        }
    }
}
