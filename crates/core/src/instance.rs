//! The instance record and its derived status.

use crate::ids::InstanceId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Status of a registered instance. `Idle` is derived, not stored: it is
/// returned when the last heartbeat is older than a soft threshold but
/// younger than the TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    /// Heartbeating within the soft threshold.
    Active,
    /// Heartbeating, but slower than the soft threshold; may be stalled.
    Idle,
    /// Currently executing claimed work (set by the caller, not derived).
    Busy,
    /// TTL elapsed; the record is gone. Never observed stored — only
    /// returned as the implicit state of a missing instance.
    Offline,
}

/// An instance (worker, coordinator, or monitor) record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Caller-supplied identifier.
    pub id: InstanceId,
    /// Declared roles, e.g. `{"worker"}`, `{"coordinator"}`.
    pub roles: HashSet<String>,
    /// Last explicitly-set status (`Active`/`Busy`); `Idle`/`Offline` are
    /// derived at read time from `last_heartbeat` and `ttl_ms`.
    pub status: InstanceStatus,
    /// Registration timestamp, milliseconds since epoch.
    pub registered_at: i64,
    /// Timestamp of the most recent heartbeat, milliseconds since epoch.
    pub last_heartbeat: i64,
    /// Time-to-live, milliseconds, reset on every heartbeat.
    pub ttl_ms: u64,
}

impl Instance {
    /// Soft threshold past which a heartbeating instance is reported
    /// `Idle` rather than `Active`, per the data model (default 30s).
    pub const IDLE_THRESHOLD_MS: i64 = 30_000;

    /// Derive the effective status as of `now`, given the record is still
    /// present (a record whose TTL elapsed is not observed at all — its
    /// absence, not this method, signals `Offline`).
    pub fn effective_status(&self, now_ms: i64) -> InstanceStatus {
        if self.status == InstanceStatus::Busy {
            return InstanceStatus::Busy;
        }
        let age = now_ms - self.last_heartbeat;
        if age >= Self::IDLE_THRESHOLD_MS {
            InstanceStatus::Idle
        } else {
            InstanceStatus::Active
        }
    }

    /// Whether this instance's TTL has elapsed as of `now`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms - self.last_heartbeat >= self.ttl_ms as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample(last_heartbeat: i64, ttl_ms: u64) -> Instance {
        Instance {
            id: InstanceId::from("w-1"),
            roles: HashSet::from(["worker".to_string()]),
            status: InstanceStatus::Active,
            registered_at: 0,
            last_heartbeat,
            ttl_ms,
        }
    }

    #[test]
    fn fresh_heartbeat_is_active() {
        let inst = sample(1_000, 60_000);
        assert_eq!(inst.effective_status(1_000), InstanceStatus::Active);
    }

    #[test]
    fn stale_heartbeat_under_ttl_is_idle() {
        let inst = sample(0, 60_000);
        assert_eq!(inst.effective_status(31_000), InstanceStatus::Idle);
    }

    #[test]
    fn ttl_elapsed_is_expired() {
        let inst = sample(0, 60_000);
        assert!(inst.is_expired(60_000));
        assert!(!inst.is_expired(59_999));
    }

    #[test]
    fn busy_overrides_idle_derivation() {
        let mut inst = sample(0, 60_000);
        inst.status = InstanceStatus::Busy;
        assert_eq!(inst.effective_status(59_000), InstanceStatus::Busy);
    }
}
