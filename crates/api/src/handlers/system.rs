//! `system.*` handlers: instance lifecycle, health/state/metrics
//! introspection, quorum voting, batch coordination, and gossip health.

use crate::context::Context;
use crate::registry::Registry;
use claudebench_core::ids::InstanceId;
use claudebench_core::{Error, Result};
use claudebench_primitives::GossipHealth;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub fn register(registry: &Registry) -> Result<()> {
    registry.register(
        super::descriptor("system.register", "Register an instance with the cluster."),
        register_instance as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("system.heartbeat", "Refresh an instance's liveness TTL."),
        heartbeat as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("system.health", "Cluster-wide health snapshot."),
        health as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("system.get_state", "Full cluster state snapshot."),
        get_state as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("system.metrics", "Aggregated per-handler call metrics."),
        metrics as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("system.quorum.vote", "Cast a vote toward a quorum decision."),
        quorum_vote as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("system.batch.process", "Coordinate one instance's share of a batch."),
        batch_process as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("system.gossip.health", "Report this instance's self-observed health."),
        gossip_health as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    Ok(())
}

#[derive(Deserialize)]
struct RegisterInput {
    id: String,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Serialize)]
struct RegisterOutput {
    registered: bool,
}

fn register_instance(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: RegisterInput = serde_json::from_value(input).map_err(|e| Error::InvalidInput {
        field: "body".into(),
        message: e.to_string(),
    })?;
    if raw.id.is_empty() {
        return Err(Error::InvalidInput {
            field: "id".into(),
            message: "must not be empty".into(),
        });
    }
    let id = InstanceId::from(raw.id);
    let roles: HashSet<String> = raw.roles.into_iter().collect();
    let ttl_ms = ctx.services.config.instance.ttl_ms;
    ctx.services.instances.register(id.clone(), roles, ttl_ms)?;
    if ctx.services.instances.is_leader(&id) {
        tracing::info!(instance = %id, "became leader on registration");
    }
    let _ = ctx.services.tasks.auto_assign(&id);
    ctx.publish(
        "instance.registered",
        HashMap::from([(
            "instanceId".to_string(),
            claudebench_core::value::Value::String(id.as_str().to_string()),
        )]),
    )?;
    Ok(serde_json::to_value(RegisterOutput { registered: true })?)
}

#[derive(Deserialize)]
struct HeartbeatInput {
    #[serde(alias = "id")]
    instance_id: String,
}

#[derive(Serialize)]
struct HeartbeatOutput {
    alive: bool,
}

fn heartbeat(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: HeartbeatInput = serde_json::from_value(input).map_err(|e| Error::InvalidInput {
        field: "instanceId".into(),
        message: e.to_string(),
    })?;
    let id = InstanceId::from(raw.instance_id);
    ctx.services.instances.heartbeat(&id)?;
    Ok(serde_json::to_value(HeartbeatOutput { alive: true })?)
}

#[derive(Serialize)]
struct HealthOutput {
    status: &'static str,
    services: HashMap<&'static str, &'static str>,
    #[serde(rename = "liveInstances")]
    live_instances: usize,
    partitioned: bool,
}

fn health(ctx: &Context, _input: serde_json::Value) -> Result<serde_json::Value> {
    let snapshot = ctx.services.system_state.get_health();
    let status = if snapshot.healthy { "healthy" } else { "degraded" };
    let services = HashMap::from([
        ("store", "up"),
        ("instances", if snapshot.live_instances > 0 { "up" } else { "down" }),
        ("gossip", if snapshot.partitioned { "partitioned" } else { "up" }),
    ]);
    Ok(serde_json::to_value(HealthOutput {
        status,
        services,
        live_instances: snapshot.live_instances,
        partitioned: snapshot.partitioned,
    })?)
}

fn get_state(ctx: &Context, _input: serde_json::Value) -> Result<serde_json::Value> {
    let state = ctx.services.system_state.get_state();
    Ok(serde_json::to_value(state)?)
}

fn metrics(ctx: &Context, _input: serde_json::Value) -> Result<serde_json::Value> {
    let snapshot = ctx.services.system_state.get_metrics();
    Ok(serde_json::to_value(snapshot)?)
}

#[derive(Deserialize)]
struct QuorumVoteInput {
    #[serde(alias = "voterId")]
    instance_id: String,
    decision: String,
    value: String,
    #[serde(rename = "totalInstances")]
    total_instances: Option<u32>,
}

#[derive(Serialize)]
struct QuorumVoteOutput {
    voted: bool,
    #[serde(rename = "quorumReached")]
    quorum_reached: bool,
    #[serde(rename = "finalDecision", skip_serializing_if = "Option::is_none")]
    final_decision: Option<String>,
    #[serde(rename = "voteCount")]
    vote_count: u32,
}

fn quorum_vote(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: QuorumVoteInput = serde_json::from_value(input).map_err(|e| Error::InvalidInput {
        field: "body".into(),
        message: e.to_string(),
    })?;
    if raw.value.is_empty() {
        return Err(Error::InvalidInput {
            field: "value".into(),
            message: "must not be empty".into(),
        });
    }
    let decision_id = raw.decision;
    let total = raw
        .total_instances
        .unwrap_or_else(|| ctx.services.instances.list_active().len() as u32)
        .max(1);
    let decision = ctx.services.quorum.vote(
        &decision_id,
        &InstanceId::from(raw.instance_id),
        &raw.value,
        total,
    )?;
    let vote_count = decision.tally.values().copied().sum();
    Ok(serde_json::to_value(QuorumVoteOutput {
        voted: true,
        quorum_reached: decision.decided.is_some(),
        final_decision: decision.decided,
        vote_count,
    })?)
}

#[derive(Deserialize)]
struct BatchProcessInput {
    #[serde(rename = "batchId")]
    batch_id: String,
    #[serde(rename = "instanceId")]
    instance_id: String,
    items: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct BatchProcessOutput {
    processed: bool,
    #[serde(rename = "processorId")]
    processor_id: String,
    #[serde(rename = "itemsProcessed")]
    items_processed: u32,
}

fn batch_process(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: BatchProcessInput = serde_json::from_value(input).map_err(|e| Error::InvalidInput {
        field: "body".into(),
        message: e.to_string(),
    })?;
    let instance_id = InstanceId::from(raw.instance_id);
    let total = raw.items.len() as u32;
    let acquired = ctx
        .services
        .batch
        .acquire(&raw.batch_id, &instance_id, total, 30_000)?;
    let state = if acquired.progress < total {
        ctx.services
            .batch
            .advance(&raw.batch_id, &instance_id, total - acquired.progress)?
    } else {
        acquired
    };
    ctx.publish(
        "batch.processed",
        HashMap::from([(
            "batchId".to_string(),
            claudebench_core::value::Value::String(raw.batch_id.clone()),
        )]),
    )?;
    Ok(serde_json::to_value(BatchProcessOutput {
        processed: true,
        processor_id: instance_id.as_str().to_string(),
        items_processed: state.progress,
    })?)
}

#[derive(Deserialize)]
struct GossipHealthInput {
    #[serde(rename = "instanceId")]
    instance_id: String,
    health: GossipHealthWire,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum GossipHealthWire {
    Healthy,
    Degraded,
    Unhealthy,
}

impl From<GossipHealthWire> for GossipHealth {
    fn from(w: GossipHealthWire) -> Self {
        match w {
            GossipHealthWire::Healthy => GossipHealth::Healthy,
            GossipHealthWire::Degraded => GossipHealth::Degraded,
            GossipHealthWire::Unhealthy => GossipHealth::Unhealthy,
        }
    }
}

#[derive(Serialize)]
struct GossipHealthOutput {
    updated: bool,
    #[serde(rename = "partitionDetected")]
    partition_detected: bool,
}

fn gossip_health(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: GossipHealthInput = serde_json::from_value(input).map_err(|e| Error::InvalidInput {
        field: "body".into(),
        message: e.to_string(),
    })?;
    let instance_id = InstanceId::from(raw.instance_id);
    ctx.services.gossip.report(&instance_id, raw.health.into())?;
    let report = ctx.services.gossip.health_report();
    Ok(serde_json::to_value(GossipHealthOutput {
        updated: true,
        partition_detected: report.partitioned,
    })?)
}
