//! Instance lifecycle: `INSTANCE_REGISTER`, `INSTANCE_HEARTBEAT`,
//! `REASSIGN_FAILED_TASKS`, and the first-writer-wins leader lease.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::ids::InstanceId;
use claudebench_core::instance::{Instance, InstanceStatus};
use claudebench_core::key::Key;
use claudebench_core::task::{Task, TaskStatus};
use claudebench_core::value::Value;
use claudebench_core::{Error, Result};
use claudebench_storage::StoreOp;
use std::collections::HashSet;

fn instance_key(id: &str) -> String {
    Key::instance(id).as_str().to_string()
}

fn load_instance(store: &claudebench_storage::StoreInner, id: &str, now: i64) -> Result<Instance> {
    let raw = store
        .get_string(&instance_key(id), now)
        .ok_or(Error::NotFound {
            entity: "instance",
            id: id.to_string(),
        })?;
    serde_json::from_str(raw).map_err(Error::Serialization)
}

/// Registration, heartbeat, and dead-worker task rescue, plus the leader
/// lease a cluster-wide sweeper gates on.
pub struct InstanceManager {
    executor: AtomicExecutor,
}

impl InstanceManager {
    /// Build an instance manager over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self { executor }
    }

    /// `INSTANCE_REGISTER(id, roles, ttlMs)`. A `coordinator`-role instance
    /// also attempts the leader lease, but only if it is currently unheld —
    /// first writer wins, per §4.7.
    pub fn register(&self, id: InstanceId, roles: HashSet<String>, ttl_ms: u64) -> Result<Instance> {
        self.executor.execute("INSTANCE_REGISTER", move |store, now| {
            let instance = Instance {
                id: id.clone(),
                roles: roles.clone(),
                status: InstanceStatus::Active,
                registered_at: now,
                last_heartbeat: now,
                ttl_ms,
            };
            let mut ops = vec![
                StoreOp::SetString {
                    key: instance_key(id.as_str()),
                    value: serde_json::to_string(&instance)?,
                    expire_at_ms: Some(now + ttl_ms as i64),
                },
                StoreOp::SetAdd {
                    key: Key::active_instances().as_str().to_string(),
                    member: id.as_str().to_string(),
                },
            ];
            if roles.contains("coordinator")
                && store.get_string(Key::leader_lease().as_str(), now).is_none()
            {
                ops.push(StoreOp::SetString {
                    key: Key::leader_lease().as_str().to_string(),
                    value: id.as_str().to_string(),
                    expire_at_ms: Some(now + ttl_ms as i64),
                });
            }
            Ok((instance, ops))
        })
    }

    /// `INSTANCE_HEARTBEAT(id)`. Refreshes the TTL and, if this instance
    /// currently holds the leader lease, renews it in the same call so a
    /// live leader's lease never lapses mid-heartbeat-interval.
    pub fn heartbeat(&self, id: &InstanceId) -> Result<Instance> {
        let id = id.clone();
        self.executor.execute("INSTANCE_HEARTBEAT", move |store, now| {
            let mut instance = load_instance(store, id.as_str(), now)?;
            instance.last_heartbeat = now;
            let mut ops = vec![StoreOp::SetString {
                key: instance_key(id.as_str()),
                value: serde_json::to_string(&instance)?,
                expire_at_ms: Some(now + instance.ttl_ms as i64),
            }];
            if store.get_string(Key::leader_lease().as_str(), now) == Some(id.as_str()) {
                ops.push(StoreOp::SetString {
                    key: Key::leader_lease().as_str().to_string(),
                    value: id.as_str().to_string(),
                    expire_at_ms: Some(now + instance.ttl_ms as i64),
                });
            }
            Ok((instance, ops))
        })
    }

    /// `REASSIGN_FAILED_TASKS(failedInstanceId)`. Scans `in_progress` tasks
    /// whose assigned worker's record has expired (TTL elapsed, whether or
    /// not it has been physically swept yet) and, per §4.2's "redistributes
    /// up to a fair share to each healthy worker", pushes each directly onto
    /// a live worker's claimed list round-robin rather than merely dropping
    /// it back into the shared pending queue for pull-claim to rediscover
    /// later. A task only falls back to `pending` (as
    /// [`crate::TaskQueue::reassign`] also does) when no healthy worker is
    /// currently registered to take it. Either way the expired worker is
    /// appended to the task's `deny_list`, tainting it the same way
    /// [`crate::TaskQueue::reassign`] taints a worker it reassigns away
    /// from.
    pub fn reassign_failed_tasks(&self) -> Result<Vec<claudebench_core::ids::TaskId>> {
        self.executor
            .execute("REASSIGN_FAILED_TASKS", |store, now| {
                let healthy_workers: Vec<String> = store
                    .set_members(Key::active_instances().as_str())
                    .into_iter()
                    .filter(|id| {
                        store
                            .get_string(&instance_key(id), now)
                            .map(|raw| {
                                serde_json::from_str::<Instance>(raw)
                                    .map(|i| i.roles.contains("worker"))
                                    .unwrap_or(false)
                            })
                            .unwrap_or(false)
                    })
                    .collect();

                let mut ops = Vec::new();
                let mut reassigned = Vec::new();
                let mut next_worker = 0usize;
                for key in store.scan_prefix("cb:task:") {
                    let Some(raw) = store.get_string(&key, now) else {
                        continue;
                    };
                    let mut task: Task = match serde_json::from_str(raw) {
                        Ok(t) => t,
                        Err(_) => continue,
                    };
                    if task.status != TaskStatus::InProgress {
                        continue;
                    }
                    let Some(worker) = task.assigned_to.clone() else {
                        continue;
                    };
                    if store.get_string(&instance_key(worker.as_str()), now).is_some() {
                        continue;
                    }
                    task.updated_at = now;
                    task.metadata.insert(
                        "reassign_reason".to_string(),
                        Value::String("instance expired".to_string()),
                    );
                    ops.push(StoreOp::ListRemoveValue {
                        key: Key::instance_queue(worker.as_str()).as_str().to_string(),
                        value: task.id.as_str().to_string(),
                    });

                    if !task.deny_list.contains(&worker) {
                        task.deny_list.push(worker.clone());
                    }

                    if healthy_workers.is_empty() {
                        task.status = TaskStatus::Pending;
                        task.assigned_to = None;
                        ops.push(StoreOp::ZAdd {
                            key: Key::pending_queue().as_str().to_string(),
                            member: task.id.as_str().to_string(),
                            score: -(task.priority as i64),
                            seq: task.insertion_seq,
                        });
                    } else {
                        let target = &healthy_workers[next_worker % healthy_workers.len()];
                        next_worker += 1;
                        task.assigned_to = Some(InstanceId::from(target.clone()));
                        ops.push(StoreOp::ListPush {
                            key: Key::instance_queue(target).as_str().to_string(),
                            value: task.id.as_str().to_string(),
                            front: false,
                        });
                    }

                    ops.push(StoreOp::SetString {
                        key: key.clone(),
                        value: serde_json::to_string(&task)?,
                        expire_at_ms: None,
                    });
                    reassigned.push(task.id.clone());
                }
                Ok((reassigned, ops))
            })
    }

    /// Fetch a single instance by id.
    pub fn get(&self, id: &InstanceId) -> Result<Instance> {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        load_instance(&store, id.as_str(), now)
    }

    /// All currently-registered (non-expired) instances.
    pub fn list_active(&self) -> Vec<Instance> {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        store
            .set_members(Key::active_instances().as_str())
            .into_iter()
            .filter_map(|id| load_instance(&store, &id, now).ok())
            .collect()
    }

    /// The instance id currently holding the leader lease, if any and live.
    pub fn current_leader(&self) -> Option<InstanceId> {
        let now = self.executor.now_millis();
        let store = self.executor.store().read_lock();
        store
            .get_string(Key::leader_lease().as_str(), now)
            .map(|s| InstanceId::from(s.to_string()))
    }

    /// Whether `id` currently holds the leader lease.
    pub fn is_leader(&self, id: &InstanceId) -> bool {
        self.current_leader().as_ref() == Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;
    use std::sync::Arc;

    fn manager() -> (InstanceManager, Arc<TestClock>) {
        let clock = Arc::new(TestClock::new(1_000));
        let executor = AtomicExecutor::in_memory(clock.clone());
        (InstanceManager::new(executor), clock)
    }

    #[test]
    fn register_then_heartbeat_refreshes_ttl() {
        let (mgr, clock) = manager();
        let id = InstanceId::from("w-1");
        mgr.register(id.clone(), HashSet::from(["worker".to_string()]), 30_000)
            .unwrap();
        clock.advance(20_000);
        let refreshed = mgr.heartbeat(&id).unwrap();
        assert_eq!(refreshed.last_heartbeat, 21_000);
        assert!(mgr.get(&id).is_ok());
    }

    #[test]
    fn first_coordinator_wins_leader_lease() {
        let (mgr, _clock) = manager();
        let a = InstanceId::from("c-1");
        let b = InstanceId::from("c-2");
        mgr.register(a.clone(), HashSet::from(["coordinator".to_string()]), 30_000)
            .unwrap();
        mgr.register(b.clone(), HashSet::from(["coordinator".to_string()]), 30_000)
            .unwrap();
        assert!(mgr.is_leader(&a));
        assert!(!mgr.is_leader(&b));
    }

    #[test]
    fn ttl_expiry_makes_instance_invisible_without_explicit_delete() {
        let (mgr, clock) = manager();
        let id = InstanceId::from("w-1");
        mgr.register(id.clone(), HashSet::new(), 10_000).unwrap();
        clock.advance(10_001);
        assert!(mgr.get(&id).is_err());
    }

    #[test]
    fn reassign_failed_tasks_returns_tasks_of_dead_worker_to_pending() {
        use crate::task_queue::TaskQueue;
        let clock = Arc::new(TestClock::new(1_000));
        let executor = AtomicExecutor::in_memory(clock.clone());
        let mgr = InstanceManager::new(executor.clone());
        let queue = TaskQueue::new(executor);

        let worker = InstanceId::from("w-1");
        mgr.register(worker.clone(), HashSet::from(["worker".to_string()]), 5_000)
            .unwrap();
        let task = queue.create("x".into(), 50, Default::default()).unwrap();
        queue.claim(&worker).unwrap();

        clock.advance(5_001);
        let reassigned = mgr.reassign_failed_tasks().unwrap();
        assert_eq!(reassigned, vec![task.id.clone()]);

        let fresh = queue.get(&task.id).unwrap();
        assert_eq!(fresh.status, TaskStatus::Pending);
        assert!(fresh.assigned_to.is_none());
    }

    #[test]
    fn reassign_failed_tasks_pushes_directly_onto_a_healthy_worker() {
        use crate::task_queue::TaskQueue;
        let clock = Arc::new(TestClock::new(1_000));
        let executor = AtomicExecutor::in_memory(clock.clone());
        let mgr = InstanceManager::new(executor.clone());
        let queue = TaskQueue::new(executor);

        let dead = InstanceId::from("w-dead");
        let healthy = InstanceId::from("w-healthy");
        mgr.register(dead.clone(), HashSet::from(["worker".to_string()]), 5_000)
            .unwrap();
        mgr.register(healthy.clone(), HashSet::from(["worker".to_string()]), 60_000)
            .unwrap();
        let task = queue.create("x".into(), 50, Default::default()).unwrap();
        queue.claim(&dead).unwrap();

        clock.advance(5_001);
        let reassigned = mgr.reassign_failed_tasks().unwrap();
        assert_eq!(reassigned, vec![task.id.clone()]);

        let fresh = queue.get(&task.id).unwrap();
        assert_eq!(fresh.status, TaskStatus::InProgress);
        assert_eq!(fresh.assigned_to, Some(healthy));
    }

    #[test]
    fn reassign_failed_tasks_falls_back_to_pending_with_no_healthy_worker() {
        use crate::task_queue::TaskQueue;
        let clock = Arc::new(TestClock::new(1_000));
        let executor = AtomicExecutor::in_memory(clock.clone());
        let mgr = InstanceManager::new(executor.clone());
        let queue = TaskQueue::new(executor);

        let dead = InstanceId::from("w-dead");
        mgr.register(dead.clone(), HashSet::from(["worker".to_string()]), 5_000)
            .unwrap();
        let task = queue.create("x".into(), 50, Default::default()).unwrap();
        queue.claim(&dead).unwrap();

        clock.advance(5_001);
        mgr.reassign_failed_tasks().unwrap();

        let fresh = queue.get(&task.id).unwrap();
        assert_eq!(fresh.status, TaskStatus::Pending);
        assert!(fresh.assigned_to.is_none());
    }
}
