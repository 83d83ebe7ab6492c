//! Innermost layer (§4.5): records the call count and latency sample every
//! dispatch contributes to `system.metrics`, regardless of outcome.

use super::Next;
use crate::descriptor::HandlerDescriptor;
use std::sync::Arc;
use std::time::Instant;

pub fn wrap(descriptor: &HandlerDescriptor, next: Next) -> Next {
    let event = descriptor.event;
    Arc::new(move |ctx, input| {
        let started = Instant::now();
        let result = (next.as_ref())(ctx, input);
        let latency_ms = started.elapsed().as_millis() as u64;
        ctx.services.metrics.record(event, latency_ms, result.is_err());
        result
    })
}
