//! The task queue: `TASK_CREATE`, `TASK_CLAIM`, `TASK_COMPLETE`,
//! `TASK_UPDATE`, `TASK_REASSIGN`, `CHECK_DELAYED_TASKS`,
//! `AUTO_ASSIGN_TASKS`, plus the read-only `task.list`/`task.assign` support
//! the handler set needs.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::ids::{InstanceId, TaskId, TaskIdAllocator};
use claudebench_core::key::Key;
use claudebench_core::task::{Task, TaskStatus};
use claudebench_core::value::Value;
use claudebench_core::{Error, Result};
use claudebench_storage::StoreOp;
use std::collections::HashMap;
use std::sync::Arc;

/// Caps `AUTO_ASSIGN_TASKS`' per-call fill, per §4.6's "fills the worker's
/// local list up to a cap".
const AUTO_ASSIGN_CAP: usize = 10;

/// Priority queue with claim/assign/complete and the delayed-task rescue
/// path. Stateless beyond the id allocator; every mutation goes through
/// [`AtomicExecutor::execute`].
pub struct TaskQueue {
    executor: AtomicExecutor,
    ids: Arc<TaskIdAllocator>,
}

/// Score a pending task sorts by in the priority zset: higher priority must
/// sort first, and `BTreeMap`-backed zsets iterate ascending, so priority is
/// negated. Ties break on the zset's own FIFO `seq`.
fn priority_score(priority: u8) -> i64 {
    -(priority as i64)
}

fn task_key(id: &str) -> String {
    Key::task(id).as_str().to_string()
}

fn load_task(store: &claudebench_storage::StoreInner, id: &str, now: i64) -> Result<Task> {
    let raw = store
        .get_string(&task_key(id), now)
        .ok_or(Error::NotFound {
            entity: "task",
            id: id.to_string(),
        })?;
    serde_json::from_str(raw).map_err(Error::Serialization)
}

fn store_task_op(task: &Task) -> StoreOp {
    StoreOp::SetString {
        key: task_key(task.id.as_str()),
        value: serde_json::to_string(task).expect("Task always serializes"),
        expire_at_ms: None,
    }
}

impl TaskQueue {
    /// Build a task queue over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self {
            executor,
            ids: Arc::new(TaskIdAllocator::new()),
        }
    }

    /// `TASK_CREATE(taskId, text, priority, status, createdAt, metadataJson)`.
    /// Allocates the next `t-<seq>` id, writes the record, and adds it to
    /// the pending queue. Idempotent-on-existing-id is defensive: the
    /// allocator only ever produces fresh ids within a process, but a
    /// replayed or externally-specified id collision still errors cleanly
    /// rather than clobbering an existing task.
    pub fn create(
        &self,
        text: String,
        priority: u8,
        metadata: HashMap<String, Value>,
    ) -> Result<Task> {
        let id = self.ids.next();
        self.executor.execute("TASK_CREATE", move |store, now| {
            let key = task_key(id.as_str());
            if store.contains_key(&key) {
                return Err(Error::Conflict {
                    message: format!("task {} already exists", id),
                });
            }
            let seq = store.next_zset_seq();
            let task = Task {
                id: id.clone(),
                text: text.clone(),
                status: TaskStatus::Pending,
                priority,
                assigned_to: None,
                result: None,
                error: None,
                created_at: now,
                updated_at: now,
                completed_at: None,
                metadata: metadata.clone(),
                deny_list: Vec::new(),
                insertion_seq: seq,
            };
            let ops = vec![
                store_task_op(&task),
                StoreOp::ZAdd {
                    key: Key::pending_queue().as_str().to_string(),
                    member: id.as_str().to_string(),
                    score: priority_score(priority),
                    seq,
                },
            ];
            Ok((task, ops))
        })
    }

    /// `TASK_CLAIM(workerId, now)`. Pops the highest-priority pending task
    /// not on the worker's deny list and assigns it. Returns `None` if the
    /// queue is empty (or every pending task denies this worker).
    pub fn claim(&self, worker_id: &InstanceId) -> Result<Option<Task>> {
        let worker_id = worker_id.clone();
        self.executor.execute("TASK_CLAIM", move |store, now| {
            let candidates = store.zset_range(Key::pending_queue().as_str(), 0, usize::MAX);
            let mut chosen: Option<Task> = None;
            for (member, _score) in candidates {
                let task = load_task(store, &member, now)?;
                if task.deny_list.contains(&worker_id) {
                    continue;
                }
                chosen = Some(task);
                break;
            }
            let Some(mut task) = chosen else {
                return Ok((None, vec![]));
            };
            task.status = TaskStatus::InProgress;
            task.assigned_to = Some(worker_id.clone());
            task.updated_at = now;
            let ops = vec![
                store_task_op(&task),
                StoreOp::ZRem {
                    key: Key::pending_queue().as_str().to_string(),
                    member: task.id.as_str().to_string(),
                },
                StoreOp::ListPush {
                    key: Key::instance_queue(worker_id.as_str()).as_str().to_string(),
                    value: task.id.as_str().to_string(),
                    front: false,
                },
            ];
            Ok((Some(task), ops))
        })
    }

    /// `task.assign {taskId, instanceId}`: explicit assignment of a
    /// specific pending task to a specific instance, bypassing the queue
    /// pop. Not named as a §4.2 script (the handler table in §6 names it
    /// without a backing script entry); implemented with the same
    /// precondition `TASK_CLAIM` enforces — only a pending task may be
    /// assigned — so the two paths can never disagree about legality.
    pub fn assign(&self, task_id: &TaskId, instance_id: &InstanceId) -> Result<Task> {
        let task_id = task_id.clone();
        let instance_id = instance_id.clone();
        self.executor.execute("TASK_ASSIGN", move |store, now| {
            let mut task = load_task(store, task_id.as_str(), now)?;
            if task.status != TaskStatus::Pending {
                return Err(Error::PreconditionFailed {
                    message: format!(
                        "task {} is not pending (status={:?})",
                        task_id, task.status
                    ),
                });
            }
            task.status = TaskStatus::InProgress;
            task.assigned_to = Some(instance_id.clone());
            task.updated_at = now;
            let ops = vec![
                store_task_op(&task),
                StoreOp::ZRem {
                    key: Key::pending_queue().as_str().to_string(),
                    member: task_id.as_str().to_string(),
                },
                StoreOp::ListPush {
                    key: Key::instance_queue(instance_id.as_str()).as_str().to_string(),
                    value: task_id.as_str().to_string(),
                    front: false,
                },
            ];
            Ok((task, ops))
        })
    }

    /// `TASK_COMPLETE(taskId, resultJson, completedAt, durationMs)`.
    /// Requires `in_progress`; per §9 open question (a), a present `result`
    /// completes the task, an absent one fails it. Removes the task from
    /// its worker's claimed list either way.
    pub fn complete(&self, task_id: &TaskId, result: Option<Value>) -> Result<Task> {
        let task_id = task_id.clone();
        self.executor.execute("TASK_COMPLETE", move |store, now| {
            let mut task = load_task(store, task_id.as_str(), now)?;
            if task.status != TaskStatus::InProgress {
                return Err(Error::PreconditionFailed {
                    message: format!(
                        "task {} is not in_progress (status={:?})",
                        task_id, task.status
                    ),
                });
            }
            let worker = task.assigned_to.clone();
            task.status = if result.is_some() {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            task.result = result;
            if task.status == TaskStatus::Failed {
                task.error = Some("completed with no result".to_string());
            }
            task.updated_at = now;
            task.completed_at = Some(now);
            let mut ops = vec![store_task_op(&task)];
            if let Some(worker) = worker {
                ops.push(StoreOp::ListRemoveValue {
                    key: Key::instance_queue(worker.as_str()).as_str().to_string(),
                    value: task_id.as_str().to_string(),
                });
            }
            Ok((task, ops))
        })
    }

    /// `TASK_UPDATE(taskId, updatesJson, updatedAt)`. Validates any status
    /// transition against [`TaskStatus::can_transition_to`]; re-scores the
    /// pending queue entry if priority changes while still pending.
    pub fn update(
        &self,
        task_id: &TaskId,
        text: Option<String>,
        status: Option<TaskStatus>,
        priority: Option<u8>,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<Task> {
        let task_id = task_id.clone();
        self.executor.execute("TASK_UPDATE", move |store, now| {
            let mut task = load_task(store, task_id.as_str(), now)?;
            if let Some(next) = status {
                if !task.status.can_transition_to(next) {
                    return Err(Error::PreconditionFailed {
                        message: format!(
                            "illegal transition {:?} -> {:?} for task {}",
                            task.status, next, task_id
                        ),
                    });
                }
                task.status = next;
            }
            if let Some(text) = text {
                task.text = text;
            }
            if let Some(meta) = metadata {
                task.metadata = meta;
            }
            let mut ops = Vec::new();
            if let Some(priority) = priority {
                task.priority = priority;
                if task.status == TaskStatus::Pending {
                    ops.push(StoreOp::ZAdd {
                        key: Key::pending_queue().as_str().to_string(),
                        member: task_id.as_str().to_string(),
                        score: priority_score(priority),
                        seq: task.insertion_seq,
                    });
                }
            }
            task.updated_at = now;
            ops.push(store_task_op(&task));
            Ok((task, ops))
        })
    }

    /// `TASK_REASSIGN(taskId, targetWorker, reason)`. Clears the current
    /// assignment and returns the task to pending at its original priority,
    /// recording `reason` in metadata. `target_worker` is accepted for
    /// contract parity with §4.2 but is advisory only: the task re-enters
    /// the shared pending queue rather than being pinned to one worker, so
    /// the usual `TASK_CLAIM` fairness still applies. The worker being
    /// reassigned away from is appended to `deny_list`, tainting it so
    /// `TASK_CLAIM` won't immediately hand the task straight back — the
    /// other populator is [`crate::InstanceManager::reassign_failed_tasks`],
    /// which taints the same way when a worker's liveness expires.
    pub fn reassign(
        &self,
        task_id: &TaskId,
        _target_worker: Option<&InstanceId>,
        reason: String,
    ) -> Result<Task> {
        let task_id = task_id.clone();
        self.executor.execute("TASK_REASSIGN", move |store, now| {
            let mut task = load_task(store, task_id.as_str(), now)?;
            let previous_worker = task.assigned_to.take();
            if let Some(worker) = &previous_worker {
                if !task.deny_list.contains(worker) {
                    task.deny_list.push(worker.clone());
                }
            }
            task.status = TaskStatus::Pending;
            task.updated_at = now;
            task.metadata
                .insert("reassign_reason".to_string(), Value::String(reason));
            let mut ops = vec![
                store_task_op(&task),
                StoreOp::ZAdd {
                    key: Key::pending_queue().as_str().to_string(),
                    member: task_id.as_str().to_string(),
                    score: priority_score(task.priority),
                    seq: task.insertion_seq,
                },
            ];
            if let Some(worker) = previous_worker {
                ops.push(StoreOp::ListRemoveValue {
                    key: Key::instance_queue(worker.as_str()).as_str().to_string(),
                    value: task_id.as_str().to_string(),
                });
            }
            Ok((task, ops))
        })
    }

    /// `CHECK_DELAYED_TASKS(delayMs, maxTasks)`. Read-only: lists pending,
    /// unassigned task ids older than `delay_ms`, for the scheduler to feed
    /// into [`Self::assign`].
    pub fn check_delayed(&self, delay_ms: i64, max_tasks: usize) -> Vec<TaskId> {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        store
            .zset_range(Key::pending_queue().as_str(), 0, usize::MAX)
            .into_iter()
            .filter_map(|(member, _)| load_task(&store, &member, now).ok())
            .filter(|t| t.assigned_to.is_none() && now - t.created_at >= delay_ms)
            .take(max_tasks)
            .map(|t| t.id)
            .collect()
    }

    /// `AUTO_ASSIGN_TASKS(workerId)`. Fills `worker_id`'s local queue with
    /// up to [`AUTO_ASSIGN_CAP`] pending tasks, highest priority first.
    /// Returns `(assigned, remaining_pending)`.
    pub fn auto_assign(&self, worker_id: &InstanceId) -> Result<(usize, usize)> {
        let worker_id = worker_id.clone();
        self.executor.execute("AUTO_ASSIGN_TASKS", move |store, now| {
            let candidates = store.zset_range(Key::pending_queue().as_str(), 0, AUTO_ASSIGN_CAP);
            let mut ops = Vec::new();
            let mut assigned = 0usize;
            for (member, _score) in &candidates {
                let mut task = match load_task(store, member, now) {
                    Ok(t) => t,
                    Err(_) => continue,
                };
                task.status = TaskStatus::InProgress;
                task.assigned_to = Some(worker_id.clone());
                task.updated_at = now;
                ops.push(store_task_op(&task));
                ops.push(StoreOp::ZRem {
                    key: Key::pending_queue().as_str().to_string(),
                    member: member.clone(),
                });
                ops.push(StoreOp::ListPush {
                    key: Key::instance_queue(worker_id.as_str()).as_str().to_string(),
                    value: member.clone(),
                    front: false,
                });
                assigned += 1;
            }
            let remaining = store.zset_card(Key::pending_queue().as_str()) - assigned;
            Ok(((assigned, remaining), ops))
        })
    }

    /// Fetch a single task by id.
    pub fn get(&self, task_id: &TaskId) -> Result<Task> {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        load_task(&store, task_id.as_str(), now)
    }

    /// `task.list`: filter by status and/or assignee, paginated.
    pub fn list(
        &self,
        status: Option<TaskStatus>,
        assigned_to: Option<&InstanceId>,
        offset: usize,
        limit: usize,
    ) -> (Vec<Task>, usize, bool) {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        let mut all: Vec<Task> = store
            .scan_prefix("cb:task:")
            .into_iter()
            .filter_map(|key| {
                let id = key.strip_prefix("cb:task:").unwrap_or(&key);
                load_task(&store, id, now).ok()
            })
            .filter(|t| status.map(|s| t.status == s).unwrap_or(true))
            .filter(|t| {
                assigned_to
                    .map(|w| t.assigned_to.as_ref() == Some(w))
                    .unwrap_or(true)
            })
            .collect();
        all.sort_by_key(|t| t.insertion_seq);
        let total = all.len();
        let page: Vec<Task> = all.into_iter().skip(offset).take(limit).collect();
        let has_more = offset + page.len() < total;
        (page, total, has_more)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;

    fn queue() -> TaskQueue {
        TaskQueue::new(AtomicExecutor::in_memory(Arc::new(TestClock::new(1_000))))
    }

    #[test]
    fn create_then_claim_then_complete_round_trips() {
        let q = queue();
        let task = q.create("Write tests".into(), 75, HashMap::new()).unwrap();
        assert_eq!(task.id.as_str(), "t-1");
        assert_eq!(task.status, TaskStatus::Pending);

        let claimed = q.claim(&InstanceId::from("w-1")).unwrap().unwrap();
        assert_eq!(claimed.id, task.id);
        assert_eq!(claimed.status, TaskStatus::InProgress);

        let done = q
            .complete(&task.id, Some(Value::Bool(true)))
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let err = q.complete(&task.id, Some(Value::Bool(true))).unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }

    #[test]
    fn complete_without_result_fails_task() {
        let q = queue();
        let task = q.create("x".into(), 50, HashMap::new()).unwrap();
        q.claim(&InstanceId::from("w-1")).unwrap();
        let done = q.complete(&task.id, None).unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
    }

    #[test]
    fn claim_returns_highest_priority_first_fifo_on_ties() {
        let q = queue();
        q.create("low".into(), 10, HashMap::new()).unwrap();
        let high = q.create("high".into(), 90, HashMap::new()).unwrap();
        let mid_a = q.create("mid-a".into(), 50, HashMap::new()).unwrap();
        let mid_b = q.create("mid-b".into(), 50, HashMap::new()).unwrap();

        let c1 = q.claim(&InstanceId::from("w-1")).unwrap().unwrap();
        assert_eq!(c1.id, high.id);
        let c2 = q.claim(&InstanceId::from("w-1")).unwrap().unwrap();
        assert_eq!(c2.id, mid_a.id);
        let c3 = q.claim(&InstanceId::from("w-1")).unwrap().unwrap();
        assert_eq!(c3.id, mid_b.id);
    }

    #[test]
    fn claim_on_empty_queue_returns_none() {
        let q = queue();
        assert!(q.claim(&InstanceId::from("w-1")).unwrap().is_none());
    }

    #[test]
    fn reassign_returns_task_to_pending_and_clears_assignment() {
        let q = queue();
        let task = q.create("x".into(), 50, HashMap::new()).unwrap();
        q.claim(&InstanceId::from("w-1")).unwrap();
        let reassigned = q
            .reassign(&task.id, None, "worker died".into())
            .unwrap();
        assert_eq!(reassigned.status, TaskStatus::Pending);
        assert!(reassigned.assigned_to.is_none());

        let reclaimed = q.claim(&InstanceId::from("w-2")).unwrap().unwrap();
        assert_eq!(reclaimed.id, task.id);
    }

    #[test]
    fn reassign_taints_previous_worker_so_claim_skips_it() {
        let q = queue();
        let task = q.create("x".into(), 50, HashMap::new()).unwrap();
        q.claim(&InstanceId::from("w-1")).unwrap();
        let reassigned = q
            .reassign(&task.id, None, "worker died".into())
            .unwrap();
        assert_eq!(reassigned.deny_list, vec![InstanceId::from("w-1")]);

        // w-1 is denied, so it gets nothing back even though it's the only
        // worker asking; w-2 gets the task instead.
        assert!(q.claim(&InstanceId::from("w-1")).unwrap().is_none());
        let reclaimed = q.claim(&InstanceId::from("w-2")).unwrap().unwrap();
        assert_eq!(reclaimed.id, task.id);
    }

    #[test]
    fn update_rejects_illegal_transition() {
        let q = queue();
        let task = q.create("x".into(), 50, HashMap::new()).unwrap();
        let err = q
            .update(&task.id, None, Some(TaskStatus::Completed), None, None)
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }

    #[test]
    fn update_priority_while_pending_rescores_queue() {
        let q = queue();
        let low = q.create("low".into(), 10, HashMap::new()).unwrap();
        let _high = q.create("high".into(), 90, HashMap::new()).unwrap();
        q.update(&low.id, None, None, Some(99), None).unwrap();
        let claimed = q.claim(&InstanceId::from("w-1")).unwrap().unwrap();
        assert_eq!(claimed.id, low.id);
    }

    #[test]
    fn list_filters_by_status_and_paginates() {
        let q = queue();
        for i in 0..5 {
            q.create(format!("task-{i}"), 50, HashMap::new()).unwrap();
        }
        let (page, total, has_more) = q.list(Some(TaskStatus::Pending), None, 0, 2);
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert!(has_more);
    }

    #[test]
    fn auto_assign_fills_up_to_cap() {
        let q = queue();
        for i in 0..15 {
            q.create(format!("task-{i}"), 50, HashMap::new()).unwrap();
        }
        let (assigned, remaining) = q.auto_assign(&InstanceId::from("w-1")).unwrap();
        assert_eq!(assigned, AUTO_ASSIGN_CAP);
        assert_eq!(remaining, 15 - AUTO_ASSIGN_CAP);
    }

    #[test]
    fn check_delayed_finds_only_old_unassigned_tasks() {
        let q = queue();
        q.create("fresh".into(), 50, HashMap::new()).unwrap();
        let delayed = q.check_delayed(10_000, 50);
        assert!(delayed.is_empty());
    }
}
