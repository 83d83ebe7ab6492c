//! The handler invocation context: `{store, publish, eventId, eventType,
//! timestamp, instanceId, persist, metadata}` per §4.4 step 4.
//!
//! Handlers receive only this context — never HTTP/transport specifics —
//! so the same handler body serves the embedded dispatcher and, behind the
//! `rpc`/`mcp` features, the JSON-RPC/SSE transport in [`crate::transport`].

use claudebench_core::value::Value;
use claudebench_core::Result;
use claudebench_engine::Services;
use std::collections::HashMap;

/// Everything a handler body needs: the shared service facades (`store` in
/// the spec's vocabulary is every `claudebench-primitives` facade reachable
/// through [`Services`]), plus per-call identity and metadata.
///
/// Cheap to clone: `services` is a bundle of `Arc` handles, and a clone is
/// exactly what the timeout middleware needs to hand the handler body to a
/// worker thread while the dispatcher's own stack frame returns on deadline.
#[derive(Clone)]
pub struct Context {
    /// Shared facades: task queue, instance manager, event bus, etc.
    pub services: Services,
    /// The dispatched event name, e.g. `task.create`.
    pub event_type: String,
    /// Unique id assigned to this dispatch, used for exactly-once dedup
    /// and audit correlation.
    pub event_id: String,
    /// Dispatch timestamp, milliseconds since epoch.
    pub timestamp: i64,
    /// Caller-supplied instance id, if the transport identified one.
    pub instance_id: Option<String>,
    /// Whether this handler's descriptor opted into relational persistence.
    pub persist: bool,
    /// Caller-supplied opaque metadata, carried through audit/events.
    pub metadata: HashMap<String, Value>,
}

impl Context {
    /// Publish a domain event onto the event bus, tagged with this
    /// dispatch's `event_id` in its metadata for correlation.
    pub fn publish(&self, event_type: &str, mut payload: HashMap<String, Value>) -> Result<()> {
        payload
            .entry("causedBy".to_string())
            .or_insert_with(|| Value::String(self.event_id.clone()));
        self.services.events.publish(event_type, payload)?;
        Ok(())
    }
}
