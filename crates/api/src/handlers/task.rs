//! `task.*` handlers (§6 plus the `task.reassign` C8 supplement).

use crate::context::Context;
use crate::registry::Registry;
use claudebench_core::ids::{InstanceId, TaskId};
use claudebench_core::task::{Task, TaskStatus};
use claudebench_core::value::Value;
use claudebench_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MAX_TEXT_LEN: usize = 500;
const DEFAULT_PRIORITY: u8 = 50;

pub fn register(registry: &Registry) -> Result<()> {
    registry.register(
        super::descriptor("task.create", "Create a new pending task."),
        create as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("task.update", "Update a task's fields or status."),
        update as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("task.assign", "Explicitly assign a pending task to an instance."),
        assign as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("task.claim", "Claim the highest-priority pending task."),
        claim as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("task.complete", "Complete or fail an in-progress task."),
        complete as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("task.list", "List tasks, filtered and paginated."),
        list as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    registry.register(
        super::descriptor("task.reassign", "Return a task to pending, clearing its assignment."),
        reassign as fn(&Context, serde_json::Value) -> Result<serde_json::Value>,
    )?;
    Ok(())
}

/// Client-facing camelCase view of a [`Task`]; kept separate from the
/// record's own `serde` derive so the `cb:task:<id>` on-disk shape can
/// evolve independently of the wire contract.
#[derive(Serialize)]
struct TaskView {
    id: String,
    text: String,
    status: TaskStatus,
    priority: u8,
    #[serde(rename = "assignedTo", skip_serializing_if = "Option::is_none")]
    assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: i64,
    #[serde(rename = "updatedAt")]
    updated_at: i64,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    completed_at: Option<i64>,
    metadata: HashMap<String, Value>,
}

impl From<&Task> for TaskView {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id.as_str().to_string(),
            text: t.text.clone(),
            status: t.status,
            priority: t.priority,
            assigned_to: t.assigned_to.as_ref().map(|w| w.as_str().to_string()),
            result: t.result.clone(),
            error: t.error.clone(),
            created_at: t.created_at,
            updated_at: t.updated_at,
            completed_at: t.completed_at,
            metadata: t.metadata.clone(),
        }
    }
}

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::InvalidInput {
        field: field.to_string(),
        message: message.into(),
    }
}

fn parse<T: serde::de::DeserializeOwned>(input: serde_json::Value) -> Result<T> {
    serde_json::from_value(input).map_err(|e| invalid("body", e.to_string()))
}

#[derive(Deserialize)]
struct CreateInput {
    text: String,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn create(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: CreateInput = parse(input)?;
    if raw.text.is_empty() || raw.text.chars().count() > MAX_TEXT_LEN {
        return Err(invalid("text", format!("must be 1..={MAX_TEXT_LEN} characters")));
    }
    if raw.priority > 100 {
        return Err(invalid("priority", "must be in 0..=100"));
    }
    let task = ctx.services.tasks.create(raw.text, raw.priority, raw.metadata)?;
    ctx.publish(
        "task.created",
        HashMap::from([("taskId".to_string(), Value::String(task.id.to_string()))]),
    )?;
    Ok(serde_json::to_value(TaskView::from(&task))?)
}

#[derive(Deserialize, Default)]
struct TaskUpdates {
    text: Option<String>,
    status: Option<TaskStatus>,
    priority: Option<u8>,
    metadata: Option<HashMap<String, Value>>,
}

#[derive(Deserialize)]
struct UpdateInput {
    id: String,
    #[serde(default)]
    updates: TaskUpdates,
}

fn update(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: UpdateInput = parse(input)?;
    if let Some(priority) = raw.updates.priority {
        if priority > 100 {
            return Err(invalid("updates.priority", "must be in 0..=100"));
        }
    }
    if let Some(text) = &raw.updates.text {
        if text.is_empty() || text.chars().count() > MAX_TEXT_LEN {
            return Err(invalid("updates.text", format!("must be 1..={MAX_TEXT_LEN} characters")));
        }
    }
    let task_id = TaskId(raw.id);
    let task = ctx.services.tasks.update(
        &task_id,
        raw.updates.text,
        raw.updates.status,
        raw.updates.priority,
        raw.updates.metadata,
    )?;
    ctx.publish(
        "task.updated",
        HashMap::from([("taskId".to_string(), Value::String(task.id.to_string()))]),
    )?;
    Ok(serde_json::to_value(TaskView::from(&task))?)
}

#[derive(Deserialize)]
struct AssignInput {
    #[serde(rename = "taskId")]
    task_id: String,
    #[serde(rename = "instanceId")]
    instance_id: String,
}

#[derive(Serialize)]
struct AssignOutput {
    #[serde(rename = "taskId")]
    task_id: String,
    #[serde(rename = "instanceId")]
    instance_id: String,
    #[serde(rename = "assignedAt")]
    assigned_at: i64,
}

fn assign(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: AssignInput = parse(input)?;
    let instance_id = InstanceId::from(raw.instance_id);
    let task = ctx
        .services
        .tasks
        .assign(&TaskId(raw.task_id), &instance_id)?;
    ctx.publish(
        "task.assigned",
        HashMap::from([
            ("taskId".to_string(), Value::String(task.id.to_string())),
            ("instanceId".to_string(), Value::String(instance_id.to_string())),
        ]),
    )?;
    Ok(serde_json::to_value(AssignOutput {
        task_id: task.id.to_string(),
        instance_id: instance_id.to_string(),
        assigned_at: task.updated_at,
    })?)
}

#[derive(Deserialize)]
struct ClaimInput {
    #[serde(rename = "workerId")]
    worker_id: String,
    #[serde(rename = "maxTasks", default = "default_max_tasks")]
    max_tasks: u8,
}

fn default_max_tasks() -> u8 {
    1
}

#[derive(Serialize)]
struct ClaimOutput {
    claimed: bool,
    #[serde(rename = "taskId", skip_serializing_if = "Option::is_none")]
    task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    task: Option<TaskView>,
    #[serde(rename = "claimedCount")]
    claimed_count: usize,
}

fn claim(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: ClaimInput = parse(input)?;
    if raw.max_tasks == 0 || raw.max_tasks > 10 {
        return Err(invalid("maxTasks", "must be in 1..=10"));
    }
    let worker_id = InstanceId::from(raw.worker_id);
    let mut claimed = Vec::new();
    for _ in 0..raw.max_tasks {
        match ctx.services.tasks.claim(&worker_id)? {
            Some(task) => claimed.push(task),
            None => break,
        }
    }
    if let Some(first) = claimed.first() {
        ctx.publish(
            "task.claimed",
            HashMap::from([
                ("taskId".to_string(), Value::String(first.id.to_string())),
                ("workerId".to_string(), Value::String(worker_id.to_string())),
            ]),
        )?;
    }
    let claimed_count = claimed.len();
    Ok(serde_json::to_value(ClaimOutput {
        claimed: claimed_count > 0,
        task_id: claimed.first().map(|t| t.id.to_string()),
        task: claimed.first().map(TaskView::from),
        claimed_count,
    })?)
}

#[derive(Deserialize)]
struct CompleteInput {
    #[serde(alias = "taskId")]
    id: String,
    result: Option<Value>,
}

#[derive(Serialize)]
struct CompleteOutput {
    id: String,
    status: TaskStatus,
    #[serde(rename = "completedAt")]
    completed_at: Option<i64>,
}

fn complete(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: CompleteInput = parse(input)?;
    let task_id = TaskId(raw.id);
    let task = ctx.services.tasks.complete(&task_id, raw.result)?;
    ctx.publish(
        if task.status == TaskStatus::Completed {
            "task.completed"
        } else {
            "task.failed"
        },
        HashMap::from([("taskId".to_string(), Value::String(task.id.to_string()))]),
    )?;
    Ok(serde_json::to_value(CompleteOutput {
        id: task.id.to_string(),
        status: task.status,
        completed_at: task.completed_at,
    })?)
}

#[derive(Deserialize, Default)]
struct ListInput {
    status: Option<TaskStatus>,
    #[serde(rename = "assignedTo")]
    assigned_to: Option<String>,
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_list_limit")]
    limit: usize,
}

fn default_list_limit() -> usize {
    20
}

#[derive(Serialize)]
struct ListOutput {
    tasks: Vec<TaskView>,
    #[serde(rename = "totalCount")]
    total_count: usize,
    #[serde(rename = "hasMore")]
    has_more: bool,
}

fn list(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: ListInput = if input.is_null() {
        ListInput::default()
    } else {
        parse(input)?
    };
    let assigned_to = raw.assigned_to.map(InstanceId::from);
    let (tasks, total_count, has_more) = ctx.services.tasks.list(
        raw.status,
        assigned_to.as_ref(),
        raw.offset,
        raw.limit,
    );
    Ok(serde_json::to_value(ListOutput {
        tasks: tasks.iter().map(TaskView::from).collect(),
        total_count,
        has_more,
    })?)
}

#[derive(Deserialize)]
struct ReassignInput {
    #[serde(rename = "taskId")]
    task_id: String,
    #[serde(rename = "targetWorker")]
    target_worker: Option<String>,
    #[serde(default = "default_reassign_reason")]
    reason: String,
}

fn default_reassign_reason() -> String {
    "manual reassignment".to_string()
}

fn reassign(ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
    let raw: ReassignInput = parse(input)?;
    let target = raw.target_worker.map(InstanceId::from);
    let task = ctx
        .services
        .tasks
        .reassign(&TaskId(raw.task_id), target.as_ref(), raw.reason)?;
    ctx.publish(
        "task.reassigned",
        HashMap::from([("taskId".to_string(), Value::String(task.id.to_string()))]),
    )?;
    Ok(serde_json::to_value(TaskView::from(&task))?)
}
