//! `register(descriptor, fn)` per §4.4: called at startup by the handler
//! modules; registering a duplicate event name is an error.

use crate::descriptor::HandlerDescriptor;
use crate::handler::Handler;
use claudebench_core::Error;
use dashmap::DashMap;
use std::sync::Arc;

struct Registration {
    descriptor: HandlerDescriptor,
    handler: Arc<dyn Handler>,
}

/// Holds every registered handler, keyed by event name.
#[derive(Default)]
pub struct Registry {
    entries: DashMap<&'static str, Registration>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `descriptor.event`. Fails if that event is
    /// already registered — descriptors are immutable after startup.
    pub fn register(
        &self,
        descriptor: HandlerDescriptor,
        handler: impl Handler + 'static,
    ) -> Result<(), Error> {
        let event = descriptor.event;
        if self.entries.contains_key(event) {
            return Err(Error::Conflict {
                message: format!("handler for event '{event}' is already registered"),
            });
        }
        self.entries.insert(
            event,
            Registration {
                descriptor,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Look up a handler and its descriptor by event name.
    pub fn resolve(&self, event: &str) -> Option<(HandlerDescriptor, Arc<dyn Handler>)> {
        self.entries
            .get(event)
            .map(|entry| (entry.descriptor.clone(), entry.handler.clone()))
    }

    /// Every registered event name, for `system.get_state`/introspection.
    pub fn events(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| *e.key()).collect()
    }
}
