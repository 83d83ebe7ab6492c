//! # ClaudeBench
//!
//! Distributed event-dispatch and coordination runtime for fleets of
//! cooperating AI-agent instances: a JSON-RPC-shaped dispatcher over an
//! in-process atomic executor, with a task priority queue, instance
//! lifecycle tracking, circuit breaking, rate limiting, a read-through
//! response cache, quorum voting, gossip health, batch coordination, and
//! an event bus — the coordination primitives a set of worker processes
//! needs without stepping on each other's state.
//!
//! # Quick start
//!
//! ```no_run
//! use claudebench::ClaudeBench;
//! use serde_json::json;
//!
//! fn main() -> claudebench::Result<()> {
//!     let mut bench = ClaudeBench::boot(Default::default(), None)?;
//!     bench.start();
//!
//!     bench.dispatch(
//!         "system.register",
//!         json!({"id": "w-1", "roles": ["worker"]}),
//!         None,
//!     )?;
//!
//!     let task = bench.dispatch(
//!         "task.create",
//!         json!({"text": "summarize the incident report"}),
//!         None,
//!     )?;
//!     assert_eq!(task["status"], "pending");
//!
//!     let claimed = bench.dispatch(
//!         "task.claim",
//!         json!({"workerId": "w-1"}),
//!         Some("w-1".to_string()),
//!     )?;
//!     assert_eq!(claimed["claimed"], true);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Crate | Responsibility |
//! |-------|----------------|
//! | `claudebench-core` | Ids, value model, config, clock, unified error type |
//! | `claudebench-storage` | In-memory KV/zset/list/stream store |
//! | `claudebench-concurrency` | Single-writer atomic script executor |
//! | `claudebench-durability` | Write-ahead log and crash recovery |
//! | `claudebench-primitives` | Task queue, instance manager, circuit breaker, rate limiter, cache, quorum, gossip, batch, dedup, event bus, audit log |
//! | `claudebench-engine` | Process orchestration: boot, background sweepers, shared `Services` |
//! | `claudebench-api` | Registry, dispatcher, middleware envelope, handler set, transport |
//!
//! [`ClaudeBench`] is the façade over all seven: it boots an [`Engine`],
//! registers every handler on a fresh registry, and exposes one `dispatch`
//! call. For direct access to any layer below — e.g. to read `Services`
//! fields a handler wouldn't expose, or to wire the `rpc`/`mcp` transport
//! behind `claudebench_api::transport` — construct the pieces directly;
//! this façade adds nothing the crates below don't already expose on
//! their own.

#![warn(missing_docs)]

use std::path::PathBuf;

pub use claudebench_api::{Context, Dispatcher, Handler, HandlerDescriptor, Registry};
pub use claudebench_core::config::ClaudeBenchConfig;
pub use claudebench_core::ids::InstanceId;
pub use claudebench_core::{Error, Result};
pub use claudebench_engine::{Engine, Services};

/// The top-level façade: a running [`Engine`] plus a fully wired
/// [`Dispatcher`] with every first-class handler registered.
pub struct ClaudeBench {
    engine: Engine,
    dispatcher: Dispatcher,
}

impl ClaudeBench {
    /// Boot a fresh or recovered process and register every handler.
    /// `wal_path` of `None` runs fully in-memory, with no durability —
    /// suitable for tests and ephemeral embedded use; `Some(path)`
    /// replays any existing write-ahead log and resumes appending to it.
    pub fn boot(config: ClaudeBenchConfig, wal_path: Option<PathBuf>) -> Result<Self> {
        let engine = Engine::boot(config, wal_path)?;
        let dispatcher = claudebench_api::build_dispatcher(engine.services.clone())?;
        Ok(Self { engine, dispatcher })
    }

    /// Start the background sweepers: liveness (reassigns tasks off dead
    /// instances), self-heartbeat, and the leader-gated cluster jobs
    /// (delayed-task rescue, global metrics aggregation).
    pub fn start(&mut self) {
        self.engine.start();
    }

    /// Dispatch one call through the fixed middleware envelope
    /// (rate-limit → timeout → circuit-breaker → cache → audit →
    /// measured → handler body).
    pub fn dispatch(
        &self,
        event: &str,
        input: serde_json::Value,
        actor: Option<String>,
    ) -> Result<serde_json::Value> {
        self.dispatcher.dispatch(event, input, actor)
    }

    /// This process's own instance id, registered with the `coordinator`
    /// role at boot.
    pub fn self_id(&self) -> &InstanceId {
        self.engine.self_id()
    }

    /// The shared service bundle every handler and sweeper operates on.
    pub fn services(&self) -> &Services {
        &self.engine.services
    }

    /// The underlying dispatcher, for transport wiring or introspection.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Stop every sweeper and consume the engine.
    pub fn shutdown(self) {
        self.engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boots_registers_handlers_and_dispatches_a_round_trip() {
        let bench = ClaudeBench::boot(ClaudeBenchConfig::default(), None).unwrap();

        bench
            .dispatch("system.register", json!({"id": "w-1", "roles": ["worker"]}), None)
            .unwrap();

        let task = bench
            .dispatch("task.create", json!({"text": "do the thing"}), None)
            .unwrap();
        assert_eq!(task["status"], "pending");

        let claimed = bench
            .dispatch("task.claim", json!({"workerId": "w-1"}), Some("w-1".to_string()))
            .unwrap();
        assert_eq!(claimed["claimed"], true);
    }

    #[test]
    fn unknown_event_surfaces_method_not_found() {
        let bench = ClaudeBench::boot(ClaudeBenchConfig::default(), None).unwrap();
        let err = bench.dispatch("nope.nope", json!({}), None).unwrap_err();
        assert_eq!(err.json_rpc_code(), -32601);
    }
}
