//! `AGGREGATE_GLOBAL_METRICS`, `GET_SYSTEM_HEALTH`, `GET_SYSTEM_STATE`:
//! read-only cross-cutting views, composed from the other facades rather
//! than touching the store directly.

use crate::dedup::Deduplicator;
use crate::gossip::GossipTracker;
use crate::instance_manager::InstanceManager;
use crate::metrics::MetricsRecorder;
use crate::task_queue::TaskQueue;
use claudebench_concurrency::AtomicExecutor;
use claudebench_core::instance::InstanceStatus;
use claudebench_core::task::TaskStatus;
use serde::Serialize;

/// `system.get_state` response: everything a new instance or an operator
/// dashboard needs to reconstruct the cluster's current picture.
#[derive(Debug, Clone, Serialize)]
pub struct SystemState {
    /// Instances currently registered, with derived status.
    pub instances: Vec<InstanceSummary>,
    /// Count of tasks in each status.
    pub task_counts: TaskCounts,
    /// Current leader, if any.
    pub leader: Option<String>,
}

/// Per-instance summary used in [`SystemState`].
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSummary {
    /// Instance id.
    pub id: String,
    /// Derived status as of the query time.
    pub status: InstanceStatus,
    /// Declared roles.
    pub roles: Vec<String>,
}

/// Task counts by status.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskCounts {
    /// `pending` tasks.
    pub pending: usize,
    /// `in_progress` tasks.
    pub in_progress: usize,
    /// `completed` tasks.
    pub completed: usize,
    /// `failed` tasks.
    pub failed: usize,
}

/// `system.health` response.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    /// `false` if a gossip-detected partition or zero live instances.
    pub healthy: bool,
    /// Number of currently-live instances.
    pub live_instances: usize,
    /// Whether the gossip table suspects a network partition.
    pub partitioned: bool,
}

/// `system.metrics` response.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalMetrics {
    /// Task counts by status.
    pub tasks: TaskCounts,
    /// Duplicate deliveries dropped so far.
    pub duplicates_prevented: i64,
    /// Per-event call counts and latency percentiles.
    pub handlers: Vec<crate::metrics::HandlerMetrics>,
}

/// Composes the other facades into the three read-only system-wide views.
///
/// Takes its [`MetricsRecorder`] by value (cheap: it's an `Arc` handle) so
/// `system.metrics` reads the same in-process reservoir the dispatcher's
/// measured middleware writes to, rather than an empty one of its own —
/// constructing a fresh recorder here would silently report zero calls for
/// every handler. Callers must pass the engine's single shared instance.
pub struct SystemStateReader {
    executor: AtomicExecutor,
    metrics: MetricsRecorder,
}

impl SystemStateReader {
    /// Build a reader over a shared executor and the process's one shared
    /// [`MetricsRecorder`].
    pub fn new(executor: AtomicExecutor, metrics: MetricsRecorder) -> Self {
        Self { executor, metrics }
    }

    fn task_counts(&self, queue: &TaskQueue) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            let (_page, total, _more) = queue.list(Some(status), None, 0, 0);
            match status {
                TaskStatus::Pending => counts.pending = total,
                TaskStatus::InProgress => counts.in_progress = total,
                TaskStatus::Completed => counts.completed = total,
                TaskStatus::Failed => counts.failed = total,
            }
        }
        counts
    }

    /// `GET_SYSTEM_STATE()`.
    pub fn get_state(&self) -> SystemState {
        let instances = InstanceManager::new(self.executor.clone());
        let queue = TaskQueue::new(self.executor.clone());
        let now = self.executor.now_millis();
        SystemState {
            instances: instances
                .list_active()
                .into_iter()
                .map(|i| InstanceSummary {
                    id: i.id.as_str().to_string(),
                    status: i.effective_status(now),
                    roles: i.roles.into_iter().collect(),
                })
                .collect(),
            task_counts: self.task_counts(&queue),
            leader: instances.current_leader().map(|id| id.as_str().to_string()),
        }
    }

    /// `GET_SYSTEM_HEALTH()`.
    pub fn get_health(&self) -> SystemHealth {
        let instances = InstanceManager::new(self.executor.clone());
        let gossip = GossipTracker::new(self.executor.clone());
        let live = instances.list_active().len();
        let report = gossip.health_report();
        SystemHealth {
            healthy: live > 0 && !report.partitioned,
            live_instances: live,
            partitioned: report.partitioned,
        }
    }

    /// `AGGREGATE_GLOBAL_METRICS()`.
    pub fn get_metrics(&self) -> GlobalMetrics {
        let queue = TaskQueue::new(self.executor.clone());
        let dedup = Deduplicator::new(self.executor.clone());
        GlobalMetrics {
            tasks: self.task_counts(&queue),
            duplicates_prevented: dedup.duplicates_prevented(),
            handlers: self.metrics.snapshot(),
        }
    }
}
