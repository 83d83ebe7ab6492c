//! Physical mutations applied to the store.
//!
//! A `StoreOp` is the unit the write-ahead log records and replays: each
//! atomic operation validates against the current state and, only once
//! every precondition holds, produces the `Vec<StoreOp>` it needs applied.
//! Recovery replays the same ops against an empty store, never the
//! business logic that produced them.

use serde::{Deserialize, Serialize};

/// A single mutation to apply to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreOp {
    /// Set a string key, with an optional absolute expiry.
    SetString {
        key: String,
        value: String,
        expire_at_ms: Option<i64>,
    },
    /// Delete a key outright (any shape).
    Delete { key: String },
    /// Add `delta` to a string key parsed as an integer, creating it at 0
    /// first if absent.
    IncrBy { key: String, delta: i64 },
    /// Set a single hash field.
    HashSet {
        key: String,
        field: String,
        value: String,
    },
    /// Add `delta` to a hash field parsed as an integer, creating the
    /// field at 0 first if absent.
    HashIncrBy {
        key: String,
        field: String,
        delta: i64,
    },
    /// Add or re-score a sorted-set member; `seq` breaks score ties FIFO.
    ZAdd {
        key: String,
        member: String,
        score: i64,
        seq: u64,
    },
    /// Remove a sorted-set member.
    ZRem { key: String, member: String },
    /// Push a value onto a list.
    ListPush {
        key: String,
        value: String,
        front: bool,
    },
    /// Remove the first matching value from a list.
    ListRemoveValue { key: String, value: String },
    /// Trim a list to the given inclusive start/end range.
    ListTrim { key: String, start: i64, end: i64 },
    /// Append an entry to a stream; `id` is pre-assigned by the caller
    /// after reading the stream's `next_id` under the same lock.
    StreamAppend {
        key: String,
        id: u64,
        payload: serde_json::Value,
    },
    /// Add a member to an unordered set.
    SetAdd { key: String, member: String },
    /// Remove a member from an unordered set.
    SetRemove { key: String, member: String },
}
