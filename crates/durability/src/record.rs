//! The unit the WAL records and replays: one committed script's op batch.

use claudebench_storage::StoreOp;
use serde::{Deserialize, Serialize};

/// A single committed atomic script, as durably logged.
///
/// Recovery replays `ops` in order against an empty store; it never re-runs
/// the script's validation logic, only the physical mutations it already
/// decided on (see `claudebench-concurrency`'s executor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalRecord {
    /// Monotonic sequence number, assigned by the writer.
    pub seq: u64,
    /// Name of the script that produced this batch, for tracing/debugging.
    pub script: &'static str,
    /// Physical mutations to apply, in order.
    pub ops: Vec<StoreOp>,
    /// Commit timestamp, milliseconds since epoch.
    pub timestamp_ms: i64,
}

impl WalRecord {
    /// Serialize to the JSON payload stored between the length/checksum
    /// framing bytes.
    pub fn to_payload(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("WalRecord always serializes")
    }

    /// Deserialize a payload back into a record.
    pub fn from_payload(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
