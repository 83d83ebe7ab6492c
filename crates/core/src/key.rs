//! The `cb:`-prefixed keyspace schema.
//!
//! Every entity in ClaudeBench lives under a key constructed by this
//! module. Keys are grouped into a handful of shapes (hash, zset, list,
//! stream, set, string) the way the original design maps them onto a
//! Redis-compatible store; here they map onto [`claudebench_storage`]'s
//! typed primitives instead of literal Redis commands.

use std::fmt;

/// A single key in the `cb:` keyspace.
///
/// `Key` is a thin wrapper over the rendered string so call sites read the
/// same as the key table in the design: `Key::task(id)`, `Key::pending_queue()`,
/// and so on, rather than ad-hoc `format!("cb:task:{}", id)` calls scattered
/// through handler bodies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the rendered key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `cb:task:<id>` — task record (hash).
    pub fn task(id: &str) -> Self {
        Self::new(format!("cb:task:{}", id))
    }

    /// `cb:queue:tasks:pending` — pending queue (zset, score = priority,
    /// ties broken by insertion order).
    pub fn pending_queue() -> Self {
        Self::new("cb:queue:tasks:pending")
    }

    /// `cb:queue:instance:<id>` — claimed task ids for worker `<id>` (list).
    pub fn instance_queue(instance_id: &str) -> Self {
        Self::new(format!("cb:queue:instance:{}", instance_id))
    }

    /// `cb:instance:<id>` — instance record (hash, TTL).
    pub fn instance(id: &str) -> Self {
        Self::new(format!("cb:instance:{}", id))
    }

    /// `cb:instances:active` — set of currently-registered instance ids.
    pub fn active_instances() -> Self {
        Self::new("cb:instances:active")
    }

    /// `cb:instances:leader` — first-writer-wins leader lease key.
    pub fn leader_lease() -> Self {
        Self::new("cb:instances:leader")
    }

    /// `cb:circuit:<event>` — circuit breaker fields for `event`.
    pub fn circuit(event: &str) -> Self {
        Self::new(format!("cb:circuit:{}", event))
    }

    /// `cb:ratelimit:<event>:<actor>` — sliding window of request timestamps.
    pub fn rate_limit(event: &str, actor: &str) -> Self {
        Self::new(format!("cb:ratelimit:{}:{}", event, actor))
    }

    /// `cb:cache:handler:<event>:<hash>` — response cache entry (string, TTL).
    pub fn cache(event: &str, input_hash: &str) -> Self {
        Self::new(format!("cb:cache:handler:{}:{}", event, input_hash))
    }

    /// `cb:stream:<event_type>` — fan-out event log for `event_type`.
    pub fn stream(event_type: &str) -> Self {
        Self::new(format!("cb:stream:{}", event_type))
    }

    /// `cb:metrics:<name>` — a named counter or gauge.
    pub fn metric(name: &str) -> Self {
        Self::new(format!("cb:metrics:{}", name))
    }

    /// `cb:audit:log` — append-only audit stream.
    pub fn audit_log() -> Self {
        Self::new("cb:audit:log")
    }

    /// `cb:gossip:health` — last-known health per instance (hash).
    pub fn gossip_health() -> Self {
        Self::new("cb:gossip:health")
    }

    /// `cb:processed:events` — exactly-once dedup set.
    pub fn processed_events() -> Self {
        Self::new("cb:processed:events")
    }

    /// `cb:duplicates:prevented` — exactly-once duplicate counter.
    pub fn duplicates_prevented() -> Self {
        Self::new("cb:duplicates:prevented")
    }

    /// `cb:quorum:decision:<d>` — quorum vote tally and latched decision.
    pub fn quorum_decision(decision_id: &str) -> Self {
        Self::new(format!("cb:quorum:decision:{}", decision_id))
    }

    /// `cb:batch:<batch_id>` — batch coordination lock/progress/total.
    pub fn batch(batch_id: &str) -> Self {
        Self::new(format!("cb:batch:{}", batch_id))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_key_format() {
        assert_eq!(Key::task("t-1").as_str(), "cb:task:t-1");
    }

    #[test]
    fn rate_limit_key_format() {
        assert_eq!(
            Key::rate_limit("task.create", "actor-1").as_str(),
            "cb:ratelimit:task.create:actor-1"
        );
    }

    #[test]
    fn instance_queue_key_format() {
        assert_eq!(Key::instance_queue("w-1").as_str(), "cb:queue:instance:w-1");
    }
}
