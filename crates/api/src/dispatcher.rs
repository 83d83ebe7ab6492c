//! `dispatch(event, input, actor?) -> output | error` (§4.4).
//!
//! Resolves the descriptor, assembles the fixed middleware envelope around
//! the handler body, builds the call's [`Context`], and invokes it. Unknown
//! events never reach a handler body or any middleware, so they can never
//! count against a circuit or show up in its metrics — `MethodNotFound` is
//! returned directly from here.

use crate::context::Context;
use crate::middleware;
use crate::registry::Registry;
use claudebench_core::value::Value;
use claudebench_core::{Error, Result};
use claudebench_engine::Services;
use std::collections::HashMap;

/// Resolves and invokes handlers through the fixed middleware stack.
pub struct Dispatcher {
    registry: Registry,
    services: Services,
}

impl Dispatcher {
    /// Build a dispatcher over a populated registry and the process's
    /// shared service bundle.
    pub fn new(registry: Registry, services: Services) -> Self {
        Self { registry, services }
    }

    /// The underlying registry, for introspection (`system.get_state`
    /// reports registered event names).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The shared service bundle this dispatcher invokes handlers against.
    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Dispatch one call. `actor` identifies the caller for rate-limiting,
    /// audit, and the context's `instance_id` — `None` for anonymous or
    /// internal callers (e.g. a sweeper re-entering the dispatcher).
    #[tracing::instrument(skip(self, input), fields(event = %event))]
    pub fn dispatch(
        &self,
        event: &str,
        input: serde_json::Value,
        actor: Option<String>,
    ) -> Result<serde_json::Value> {
        let Some((descriptor, handler)) = self.registry.resolve(event) else {
            tracing::warn!(event, "method not found");
            return Err(Error::MethodNotFound {
                event: event.to_string(),
            });
        };

        let envelope = middleware::compose(&descriptor, handler);
        let ctx = Context {
            services: self.services.clone(),
            event_type: event.to_string(),
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: self.services.executor.now_millis(),
            instance_id: actor,
            persist: descriptor.persist,
            metadata: HashMap::<String, Value>::new(),
        };

        let outcome = envelope(&ctx, input);
        match &outcome {
            Ok(_) => tracing::debug!(event, "dispatch ok"),
            Err(err) => tracing::debug!(event, %err, "dispatch failed"),
        }
        outcome
    }
}
