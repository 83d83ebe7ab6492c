//! Sliding-window rate limiting, outermost in the envelope (§4.5).

use super::Next;
use crate::descriptor::HandlerDescriptor;
use claudebench_primitives::RateLimiter;
use std::collections::HashMap;
use std::sync::Arc;

pub fn wrap(descriptor: &HandlerDescriptor, next: Next) -> Next {
    let event = descriptor.event;
    let override_config = descriptor.rate_limit.clone();
    Arc::new(move |ctx, input| {
        let actor = ctx
            .instance_id
            .clone()
            .unwrap_or_else(|| "anonymous".to_string());

        // A per-event override gets its own transient limiter over the
        // shared executor; otherwise reuse the process-wide default.
        let owned_limiter;
        let limiter: &RateLimiter = match &override_config {
            Some(cfg) => {
                owned_limiter = RateLimiter::new(ctx.services.executor.clone(), cfg.clone());
                &owned_limiter
            }
            None => &ctx.services.rate_limiter,
        };

        if let Err(err) = limiter.check(event, &actor) {
            let _ = ctx.services.audit.record(
                event.to_string(),
                Some(actor),
                Some(event.to_string()),
                claudebench_primitives::AuditResult::Blocked,
                Some(err.to_string()),
                HashMap::new(),
            );
            return Err(err);
        }

        let result = (next.as_ref())(ctx, input);
        let _ = limiter.record(event, &actor, result.is_ok());
        result
    })
}
