//! The task record and its status DAG.

use crate::ids::{InstanceId, TaskId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a task. Transitions form a DAG: `Pending -> InProgress ->
/// (Completed | Failed)`, plus an explicit `reassign` that returns a task
/// to `Pending` from `InProgress`. No other transition is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the priority queue, unclaimed.
    Pending,
    /// Claimed by a worker, not yet finished.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl TaskStatus {
    /// Whether `self -> next` is a legal transition in the status DAG.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Pending) // reassign
        )
    }
}

/// A task record, `{id: "t-<seq>", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, format `t-<seq>`.
    pub id: TaskId,
    /// Free-text task description, at most 500 characters.
    pub text: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Priority in `[0, 100]`; higher claims first.
    pub priority: u8,
    /// Worker currently holding this task, if any.
    pub assigned_to: Option<InstanceId>,
    /// Result payload, set on `Completed`.
    pub result: Option<Value>,
    /// Error detail, set on `Failed`.
    pub error: Option<String>,
    /// Creation timestamp, milliseconds since epoch.
    pub created_at: i64,
    /// Last-update timestamp, milliseconds since epoch.
    pub updated_at: i64,
    /// Completion timestamp (`Completed` or `Failed`), milliseconds since epoch.
    pub completed_at: Option<i64>,
    /// Caller-supplied opaque metadata.
    pub metadata: HashMap<String, Value>,
    /// Workers this task must not be assigned to (taint/toleration), used
    /// by `TASK_CLAIM` to skip entries. Populated by `TASK_REASSIGN` and
    /// `REASSIGN_FAILED_TASKS`, which append the worker being reassigned
    /// away from; never cleared, since a worker that lost a task once
    /// (by hand or by failure) stays ineligible for it.
    #[serde(default)]
    pub deny_list: Vec<InstanceId>,
    /// Monotonic insertion sequence, used to break priority ties FIFO.
    pub insertion_seq: u64,
}

impl Task {
    /// Whether `assigned_to` is consistent with `status`, per the data
    /// model invariant: non-nil iff status is `InProgress`, `Completed`,
    /// or `Failed` as a result of worker activity.
    pub fn assignment_invariant_holds(&self) -> bool {
        match self.status {
            TaskStatus::Pending => self.assigned_to.is_none(),
            TaskStatus::InProgress | TaskStatus::Completed | TaskStatus::Failed => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_dag_allows_only_documented_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Pending));

        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Pending));
    }
}
