//! `GOSSIP_HEALTH_UPDATE`: peer-reported health and partition detection.

use claudebench_concurrency::AtomicExecutor;
use claudebench_core::ids::InstanceId;
use claudebench_core::key::Key;
use claudebench_core::Result;
use claudebench_storage::StoreOp;
use serde::{Deserialize, Serialize};

/// One instance's self-reported health, as gossiped to its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GossipHealth {
    /// Operating normally.
    Healthy,
    /// Degraded but still making progress.
    Degraded,
    /// Not making progress.
    Unhealthy,
}

/// Cluster-wide health snapshot derived from the gossip table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Per-instance last-reported health.
    pub reports: std::collections::HashMap<InstanceId, GossipHealth>,
    /// True when more than half of reporting instances are `Unhealthy` —
    /// the cluster-level signal a coordinator uses to suspect a partition.
    pub partitioned: bool,
}

/// Facade over the `cb:gossip:health` hash.
pub struct GossipTracker {
    executor: AtomicExecutor,
}

impl GossipTracker {
    /// Build a gossip tracker over a shared executor.
    pub fn new(executor: AtomicExecutor) -> Self {
        Self { executor }
    }

    /// `GOSSIP_HEALTH_UPDATE(instanceId, health)`. Records one instance's
    /// self-reported health.
    pub fn report(&self, instance_id: &InstanceId, health: GossipHealth) -> Result<()> {
        let instance_id = instance_id.clone();
        self.executor.execute("GOSSIP_HEALTH_UPDATE", move |_store, _now| {
            let ops = vec![StoreOp::HashSet {
                key: Key::gossip_health().as_str().to_string(),
                field: instance_id.as_str().to_string(),
                value: serde_json::to_string(&health)?,
            }];
            Ok(((), ops))
        })
    }

    /// Aggregate the current gossip table into a [`HealthReport`].
    pub fn health_report(&self) -> HealthReport {
        let store = self.executor.store().read_lock();
        let fields = store
            .hash_get_all(Key::gossip_health().as_str())
            .cloned()
            .unwrap_or_default();
        let reports: std::collections::HashMap<InstanceId, GossipHealth> = fields
            .into_iter()
            .filter_map(|(id, raw)| {
                serde_json::from_str(&raw)
                    .ok()
                    .map(|h| (InstanceId::from(id), h))
            })
            .collect();
        let unhealthy = reports
            .values()
            .filter(|h| **h == GossipHealth::Unhealthy)
            .count();
        let partitioned = !reports.is_empty() && unhealthy * 2 > reports.len();
        HealthReport {
            reports,
            partitioned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claudebench_core::clock::TestClock;
    use std::sync::Arc;

    fn tracker() -> GossipTracker {
        GossipTracker::new(AtomicExecutor::in_memory(Arc::new(TestClock::new(0))))
    }

    #[test]
    fn majority_unhealthy_signals_partition() {
        let g = tracker();
        g.report(&InstanceId::from("a"), GossipHealth::Unhealthy).unwrap();
        g.report(&InstanceId::from("b"), GossipHealth::Unhealthy).unwrap();
        g.report(&InstanceId::from("c"), GossipHealth::Healthy).unwrap();
        let report = g.health_report();
        assert!(report.partitioned);
    }

    #[test]
    fn minority_unhealthy_is_not_a_partition() {
        let g = tracker();
        g.report(&InstanceId::from("a"), GossipHealth::Unhealthy).unwrap();
        g.report(&InstanceId::from("b"), GossipHealth::Healthy).unwrap();
        g.report(&InstanceId::from("c"), GossipHealth::Healthy).unwrap();
        assert!(!g.health_report().partitioned);
    }

    #[test]
    fn empty_table_is_not_partitioned() {
        let g = tracker();
        assert!(!g.health_report().partitioned);
    }
}
