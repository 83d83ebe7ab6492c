//! Per-call wall-clock budget (§4.5). The handler body (plus everything
//! inside it — circuit, cache, audit, measured) runs on a dedicated thread;
//! the dispatching thread waits at most `limitMs` before giving up and
//! returning [`claudebench_core::Error::Timeout`]. The spawned thread is not
//! killed on expiry — it keeps running and its result is simply discarded —
//! matching the spec's "a cancelled call must still observe the correctness
//! invariant of any partial work it did": the body's own atomic scripts
//! still commit or don't, uninfluenced by whether anyone is still waiting.
//!
//! If the descriptor configures a `fallback` value, expiry returns that
//! value instead of `Error::Timeout`; the timeout is still recorded against
//! audit and metrics either way.

use super::Next;
use crate::descriptor::HandlerDescriptor;
use claudebench_core::Error;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

pub fn wrap(descriptor: &HandlerDescriptor, next: Next) -> Next {
    let event = descriptor.event;
    let fallback = descriptor.fallback.clone();
    Arc::new(move |ctx, input| {
        let limit_ms = descriptor_limit_ms(ctx, event);
        let (tx, rx) = mpsc::channel();
        let worker_ctx = ctx.clone();
        let worker_next = next.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("claudebench-handler-{event}"))
            .spawn(move || {
                let result = (worker_next.as_ref())(&worker_ctx, input);
                let _ = tx.send(result);
            });

        if spawned.is_err() {
            return Err(Error::Internal("failed to spawn handler thread".into()));
        }

        match rx.recv_timeout(Duration::from_millis(limit_ms)) {
            Ok(result) => result,
            Err(_) => {
                let err = Error::Timeout { limit_ms };
                let _ = ctx.services.audit.record(
                    event.to_string(),
                    ctx.instance_id.clone(),
                    Some(event.to_string()),
                    claudebench_primitives::AuditResult::Timeout,
                    Some(err.to_string()),
                    HashMap::new(),
                );
                ctx.services.metrics.record(event, limit_ms, true);
                match &fallback {
                    Some(value) => Ok(value.clone()),
                    None => Err(err),
                }
            }
        }
    })
}

fn descriptor_limit_ms(ctx: &crate::context::Context, _event: &str) -> u64 {
    ctx.services.config.timeout.limit_ms
}
