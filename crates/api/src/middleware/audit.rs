//! Generic audit recording (§4.5): `{action=event, actor, resource=event,
//! result, reason?, metadata, timestamp}`, appended for every call that
//! reaches the handler body. Rejections from the gate middlewares above
//! (rate-limit, timeout, circuit) audit themselves directly and never
//! reach this layer — it only ever sees `success` or `failure`.
//!
//! Hook events (`hook.*`) additionally get a specialized "hook decision"
//! record alongside the generic one, per §4.5's "for hook events, a
//! specialized 'hook decision' record is also appended".

use super::Next;
use crate::descriptor::HandlerDescriptor;
use claudebench_primitives::AuditResult;
use std::collections::HashMap;
use std::sync::Arc;

pub fn wrap(descriptor: &HandlerDescriptor, next: Next) -> Next {
    let event = descriptor.event;
    let is_hook = event.starts_with("hook.");
    Arc::new(move |ctx, input| {
        let result = (next.as_ref())(ctx, input);

        let (audit_result, reason) = match &result {
            Ok(_) => (AuditResult::Success, None),
            Err(err) => (AuditResult::Failure, Some(err.to_string())),
        };
        let _ = ctx.services.audit.record(
            event.to_string(),
            ctx.instance_id.clone(),
            Some(event.to_string()),
            audit_result,
            reason.clone(),
            HashMap::new(),
        );

        if is_hook {
            let mut decision_meta = HashMap::new();
            decision_meta.insert(
                "decision".to_string(),
                claudebench_core::value::Value::String(
                    if result.is_ok() { "allow" } else { "deny" }.to_string(),
                ),
            );
            let _ = ctx.services.audit.record(
                format!("{event}.decision"),
                ctx.instance_id.clone(),
                Some(event.to_string()),
                audit_result,
                reason,
                decision_meta,
            );
        }

        result
    })
}
