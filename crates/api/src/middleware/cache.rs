//! Read-through response cache (§4.5). Opt-in per descriptor via
//! `cache_ttl_ms`; skipped entirely otherwise. Key = `hash(inputCanonicalized)`,
//! computed here since canonicalizing a JSON-RPC payload is a dispatcher
//! concern, not something [`claudebench_primitives::ResponseCache`] needs to
//! know about.

use super::Next;
use crate::descriptor::HandlerDescriptor;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub fn wrap(descriptor: &HandlerDescriptor, next: Next) -> Next {
    let Some(ttl_ms) = descriptor.cache_ttl_ms else {
        return next;
    };
    let event = descriptor.event;
    Arc::new(move |ctx, input| {
        let hash = fingerprint(&input);

        if let Some(cached) = ctx.services.cache.get(event, &hash) {
            if let Ok(value) = serde_json::from_str(&cached) {
                return Ok(value);
            }
        }

        let result = (next.as_ref())(ctx, input);

        if let Ok(output) = &result {
            if let Ok(body) = serde_json::to_string(output) {
                let _ = ctx.services.cache.set(event, &hash, body, ttl_ms);
            }
        }

        result
    })
}

/// Sort object keys recursively so structurally-identical inputs with
/// differently-ordered fields hash the same.
fn canonicalize(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[*k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

fn fingerprint(input: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonicalize(input).as_bytes());
    format!("{:x}", hasher.finalize())
}
