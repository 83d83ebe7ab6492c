//! The shared service bundle every handler and sweeper operates on.
//!
//! Every field is a cheap-to-clone facade over one [`AtomicExecutor`] (a
//! shared `Arc`), so `Services` itself is `Clone` and is handed out by value
//! to the dispatcher, to `claudebench-api`'s handler bodies, and to each
//! background sweeper — exactly one [`MetricsRecorder`] and one
//! [`CircuitTracker`] instance circulates through the whole process, which
//! is what makes `system.metrics` see the same call counts the dispatcher's
//! measured middleware records.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::config::ClaudeBenchConfig;
use claudebench_primitives::{
    AuditLog, BatchCoordinator, CircuitTracker, Deduplicator, EventBus, GossipTracker,
    InstanceManager, MetricsRecorder, QuorumTracker, RateLimiter, ResponseCache, SystemStateReader,
    TaskQueue,
};

/// Every stateless facade, constructed once and shared process-wide.
#[derive(Clone)]
pub struct Services {
    /// The atomic script executor every facade below delegates to.
    pub executor: AtomicExecutor,
    /// Runtime tunables (rate limit, circuit, instance TTL, sweep
    /// intervals, cache TTL, durability mode).
    pub config: ClaudeBenchConfig,
    /// Task queue facade (`TASK_CREATE`/`CLAIM`/`COMPLETE`/`UPDATE`/`REASSIGN`).
    pub tasks: TaskQueue,
    /// Instance lifecycle facade (register/heartbeat/leader lease).
    pub instances: InstanceManager,
    /// Quorum vote tracker.
    pub quorum: QuorumTracker,
    /// Gossip health tracker.
    pub gossip: GossipTracker,
    /// Batch coordination facade.
    pub batch: BatchCoordinator,
    /// Exactly-once delivery deduplicator.
    pub dedup: Deduplicator,
    /// Event bus (per-type durable stream + in-process pub/sub).
    pub events: EventBus,
    /// Append-only audit log.
    pub audit: AuditLog,
    /// The one shared metrics recorder (dispatcher writes, `system.metrics` reads).
    pub metrics: MetricsRecorder,
    /// Sliding-window rate limiter.
    pub rate_limiter: RateLimiter,
    /// Per-event circuit breaker tracker.
    pub circuits: CircuitTracker,
    /// Read-through response cache for the `cache` middleware layer.
    pub cache: ResponseCache,
    /// Composed read-only system-state views.
    pub system_state: SystemStateReader,
}

impl Services {
    /// Build every facade over one executor and one metrics recorder.
    pub fn new(executor: AtomicExecutor, config: ClaudeBenchConfig) -> Self {
        let metrics = MetricsRecorder::new(executor.clone());
        let system_state = SystemStateReader::new(executor.clone(), metrics.clone());
        Self {
            tasks: TaskQueue::new(executor.clone()),
            instances: InstanceManager::new(executor.clone()),
            quorum: QuorumTracker::new(executor.clone()),
            gossip: GossipTracker::new(executor.clone()),
            batch: BatchCoordinator::new(executor.clone()),
            dedup: Deduplicator::new(executor.clone()),
            events: EventBus::new(executor.clone()),
            audit: AuditLog::new(executor.clone()),
            rate_limiter: RateLimiter::new(executor.clone(), config.rate_limit.clone()),
            circuits: CircuitTracker::new(executor.clone(), config.circuit.clone()),
            cache: ResponseCache::new(executor.clone()),
            metrics,
            system_state,
            config,
            executor,
        }
    }
}
