//! Identifier types for tasks, instances, and events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Task identifier, format `t-<seq>`, monotonic within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    /// Format a task id from a sequence number.
    pub fn from_seq(seq: u64) -> Self {
        Self(format!("t-{}", seq))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide monotonic counter backing [`TaskId::from_seq`].
#[derive(Debug, Default)]
pub struct TaskIdAllocator(AtomicU64);

impl TaskIdAllocator {
    /// Create a new allocator starting at 1.
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Allocate the next task id.
    pub fn next(&self) -> TaskId {
        let seq = self.0.fetch_add(1, Ordering::Relaxed);
        TaskId::from_seq(seq)
    }
}

/// Instance (worker/coordinator/monitor) identifier. Caller-supplied at
/// `system.register` time, opaque otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for InstanceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InstanceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Event identifier used for exactly-once delivery dedup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_monotonic_and_formatted() {
        let alloc = TaskIdAllocator::new();
        assert_eq!(alloc.next().as_str(), "t-1");
        assert_eq!(alloc.next().as_str(), "t-2");
        assert_eq!(alloc.next().as_str(), "t-3");
    }
}
