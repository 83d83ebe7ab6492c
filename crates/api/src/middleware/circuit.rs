//! Per-event circuit breaker gate (§4.5). Input-validation failures never
//! reach this middleware's counters: [`claudebench_core::Error::circuit_kind`]
//! returns `None` for them, so a body that only ever fails with
//! `InvalidInput` keeps the circuit `CLOSED` forever (invariant 6).
//!
//! When the descriptor configures a `fallback` value, a rejection (`OPEN`
//! or half-open probe limit) returns that value instead of propagating the
//! error, and `CircuitOpen.fallback_returned` is set so the wire response's
//! `data.fallback` reflects it; the rejection is still audited as blocked.

use super::Next;
use crate::descriptor::HandlerDescriptor;
use claudebench_core::Error;
use claudebench_primitives::{AuditResult, CallOutcome};
use std::collections::HashMap;
use std::sync::Arc;

pub fn wrap(descriptor: &HandlerDescriptor, next: Next) -> Next {
    let event = descriptor.event;
    let fallback = descriptor.fallback.clone();
    Arc::new(move |ctx, input| {
        if let Err(mut err) = ctx.services.circuits.admit(event) {
            let fallback_used = fallback.is_some();
            if let Error::CircuitOpen { fallback_returned, .. } = &mut err {
                *fallback_returned = fallback_used;
            }
            let _ = ctx.services.audit.record(
                event.to_string(),
                ctx.instance_id.clone(),
                Some(event.to_string()),
                AuditResult::Blocked,
                Some(err.to_string()),
                HashMap::new(),
            );
            return match &fallback {
                Some(value) => Ok(value.clone()),
                None => Err(err),
            };
        }

        let result = (next.as_ref())(ctx, input);

        match &result {
            Ok(_) => {
                let _ = ctx.services.circuits.record_outcome(event, CallOutcome::Success);
            }
            Err(err) => {
                if let Some(kind) = err.circuit_kind() {
                    let _ = ctx
                        .services
                        .circuits
                        .record_outcome(event, CallOutcome::Failure(kind));
                }
            }
        }

        result
    })
}
