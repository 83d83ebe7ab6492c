//! Process orchestration: recovery on boot, background sweepers while
//! running, clean shutdown.

use crate::services::Services;
use crate::sweeper::Sweeper;
use claudebench_concurrency::AtomicExecutor;
use claudebench_core::clock::{Clock, SystemClock};
use claudebench_core::config::ClaudeBenchConfig;
use claudebench_core::ids::InstanceId;
use claudebench_core::key::Key;
use claudebench_core::Result;
use claudebench_durability::{NullWalWriter, WalWriter};
use claudebench_storage::Store;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A running ClaudeBench process: the shared [`Services`] bundle plus the
/// background sweepers that enforce liveness and leader-gated cluster
/// jobs while it's alive.
pub struct Engine {
    /// Shared facades, handed to `claudebench-api`'s dispatcher.
    pub services: Services,
    self_id: InstanceId,
    liveness: Option<Sweeper>,
    heartbeat: Option<Sweeper>,
    cluster: Option<Sweeper>,
}

impl Engine {
    /// Boot a fresh or recovered engine. `wal_path` of `None` runs fully
    /// in-memory with no durability — suitable for tests and ephemeral
    /// embedded use; `Some(path)` replays any existing log and resumes
    /// appending to it under `config.durability_mode`.
    pub fn boot(config: ClaudeBenchConfig, wal_path: Option<PathBuf>) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let executor = match wal_path {
            Some(path) => {
                let report = claudebench_durability::recover(&path)?;
                let mut writer = WalWriter::open(&path, config.durability_mode)?;
                writer.resume_from(report.last_seq);
                tracing::info!(
                    records_replayed = report.records_replayed,
                    last_seq = report.last_seq,
                    "recovered write-ahead log"
                );
                AtomicExecutor::new(Arc::new(report.store), Box::new(writer), clock)
            }
            None => AtomicExecutor::new(Arc::new(Store::new()), Box::new(NullWalWriter::default()), clock),
        };
        let self_id = InstanceId::from(format!("engine-{}", uuid::Uuid::new_v4()));
        let services = Services::new(executor, config);
        services.instances.register(
            self_id.clone(),
            HashSet::from(["coordinator".to_string()]),
            services.config.instance.ttl_ms,
        )?;
        Ok(Self {
            services,
            self_id,
            liveness: None,
            heartbeat: None,
            cluster: None,
        })
    }

    /// This process's own instance id, registered with the `coordinator`
    /// role at boot so it can contend for leadership.
    pub fn self_id(&self) -> &InstanceId {
        &self.self_id
    }

    /// Spawn the liveness sweeper (every process), the self-heartbeat
    /// sweeper (every process), and the leader-gated cluster sweeper
    /// (delayed-task rescue, global metrics aggregation — skipped by
    /// followers per §4.7).
    pub fn start(&mut self) {
        let svc = self.services.clone();
        let liveness_interval = Duration::from_millis(svc.config.instance.sweep_interval_ms);
        self.liveness = Some(Sweeper::spawn("liveness", liveness_interval, move || {
            match svc.instances.reassign_failed_tasks() {
                Ok(ids) if !ids.is_empty() => {
                    tracing::info!(count = ids.len(), "reassigned tasks from expired instances");
                }
                Ok(_) => {}
                Err(err) => tracing::error!(%err, "liveness sweep failed"),
            }
        }));

        let svc = self.services.clone();
        let self_id = self.self_id.clone();
        let heartbeat_interval = Duration::from_millis(svc.config.instance.ttl_ms / 3);
        self.heartbeat = Some(Sweeper::spawn("self-heartbeat", heartbeat_interval, move || {
            if let Err(err) = svc.instances.heartbeat(&self_id) {
                tracing::error!(%err, "engine self-heartbeat failed");
            }
        }));

        let svc = self.services.clone();
        let self_id = self.self_id.clone();
        let cluster_interval = Duration::from_millis(svc.config.task_sweep.interval_ms);
        self.cluster = Some(Sweeper::spawn("cluster", cluster_interval, move || {
            if !svc.instances.is_leader(&self_id) {
                return;
            }
            let delayed = svc.tasks.check_delayed(
                svc.config.task_sweep.delay_ms as i64,
                svc.config.task_sweep.max_tasks as usize,
            );
            if !delayed.is_empty() {
                let assigned = auto_assign_delayed(&svc, &delayed);
                tracing::info!(rescued = delayed.len(), assigned, "delayed-task sweep");
            }
            let snapshot = svc.system_state.get_metrics();
            tracing::debug!(handlers = snapshot.handlers.len(), "global metrics aggregated");
        }));
    }

    /// Stop every sweeper, joining its thread.
    pub fn shutdown(mut self) {
        if let Some(s) = self.liveness.take() {
            s.stop();
        }
        if let Some(s) = self.heartbeat.take() {
            s.stop();
        }
        if let Some(s) = self.cluster.take() {
            s.stop();
        }
    }
}

/// Assign each rescued task id to the live worker with the shortest claimed
/// list, per §4.6's "periodic sweeper ... assigns them to the least-loaded
/// live worker". Returns the count successfully assigned.
fn auto_assign_delayed(svc: &Services, task_ids: &[claudebench_core::ids::TaskId]) -> usize {
    let mut assigned = 0;
    for task_id in task_ids {
        let Some(worker) = least_loaded_worker(svc) else {
            break;
        };
        match svc.tasks.assign(task_id, &worker) {
            Ok(_) => assigned += 1,
            Err(err) => tracing::warn!(%err, task = %task_id, "delayed-task assignment failed"),
        }
    }
    assigned
}

fn least_loaded_worker(svc: &Services) -> Option<InstanceId> {
    // `list_active` takes its own read lock internally; collect its result
    // before taking another one below rather than nesting them — parking_lot's
    // `RwLock` is not safely reentrant for recursive reads on one thread.
    let workers: Vec<InstanceId> = svc
        .instances
        .list_active()
        .into_iter()
        .filter(|i| i.roles.contains("worker"))
        .map(|i| i.id)
        .collect();
    let store = svc.executor.store().read_lock();
    workers
        .into_iter()
        .min_by_key(|id| store.list_range(Key::instance_queue(id.as_str()).as_str(), 0, usize::MAX).len())
}
