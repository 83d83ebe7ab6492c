//! Audit logging: every dispatched call's outcome, appended to
//! `cb:audit:log` by the `audit` middleware layer.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::key::Key;
use claudebench_core::value::Value;
use claudebench_core::Result;
use claudebench_storage::StoreOp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    /// The handler body completed successfully.
    Success,
    /// The handler body returned an error.
    Failure,
    /// Rejected before the handler body ran (rate limit, open circuit).
    Blocked,
    /// The handler body exceeded its timeout budget.
    Timeout,
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// The dispatched event name.
    pub action: String,
    /// The caller-supplied actor/instance id, if known.
    pub actor: Option<String>,
    /// The resource acted on (e.g. a task id), if applicable.
    pub resource: Option<String>,
    /// Outcome.
    pub result: AuditResult,
    /// Human-readable reason, set for non-`Success` outcomes.
    pub reason: Option<String>,
    /// Opaque extra context.
    pub metadata: HashMap<String, Value>,
    /// Timestamp, milliseconds since epoch.
    pub timestamp: i64,
}

/// Facade appending to and reading the audit stream.
pub struct AuditLog {
    executor: AtomicExecutor,
}

impl AuditLog {
    /// Build an audit log over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self { executor }
    }

    /// Append one entry. Timestamp is assigned from the executor's clock,
    /// not the caller, so entries are ordered consistently with every other
    /// script's notion of "now".
    pub fn record(
        &self,
        action: String,
        actor: Option<String>,
        resource: Option<String>,
        result: AuditResult,
        reason: Option<String>,
        metadata: HashMap<String, Value>,
    ) -> Result<()> {
        self.executor.execute("AUDIT_APPEND", move |store, now| {
            let entry = AuditEntry {
                action,
                actor,
                resource,
                result,
                reason,
                metadata,
                timestamp: now,
            };
            let id = store.peek_next_stream_id(Key::audit_log().as_str());
            let ops = vec![StoreOp::StreamAppend {
                key: Key::audit_log().as_str().to_string(),
                id,
                payload: serde_json::to_value(&entry)?,
            }];
            Ok(((), ops))
        })
    }

    /// The most recent `limit` audit entries, newest last.
    pub fn tail(&self, limit: usize) -> Vec<AuditEntry> {
        let store = self.executor.store().read_lock();
        let len = store.stream_len(Key::audit_log().as_str());
        let after_id = len.saturating_sub(limit as u64);
        store
            .stream_range(Key::audit_log().as_str(), after_id, limit)
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry.payload).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;
    use std::sync::Arc;

    fn log() -> AuditLog {
        AuditLog::new(AtomicExecutor::in_memory(Arc::new(TestClock::new(5_000))))
    }

    #[test]
    fn appended_entries_are_readable_in_order() {
        let a = log();
        a.record(
            "task.create".into(),
            Some("w-1".into()),
            Some("t-1".into()),
            AuditResult::Success,
            None,
            HashMap::new(),
        )
        .unwrap();
        a.record(
            "task.claim".into(),
            Some("w-1".into()),
            Some("t-1".into()),
            AuditResult::Failure,
            Some("not found".into()),
            HashMap::new(),
        )
        .unwrap();

        let entries = a.tail(10);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "task.create");
        assert_eq!(entries[1].result, AuditResult::Failure);
        assert_eq!(entries[1].timestamp, 5_000);
    }

    #[test]
    fn tail_limit_keeps_only_the_most_recent() {
        let a = log();
        for i in 0..5 {
            a.record(
                format!("event-{i}"),
                None,
                None,
                AuditResult::Success,
                None,
                HashMap::new(),
            )
            .unwrap();
        }
        let entries = a.tail(2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "event-3");
        assert_eq!(entries[1].action, "event-4");
    }
}
