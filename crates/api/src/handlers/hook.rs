//! `hook.pre_tool`: a minimal pass-through handler over an injected,
//! pluggable validation policy (§9 open question (c) — hook validation
//! rules are "pluggable policy, not part of the core"). The handler body
//! itself carries no rule language: it parses the call, hands it to
//! `policy`, and reports `allow`/`deny` by the same `Ok`/`Err` convention
//! every other handler uses, so the audit middleware's "hook decision"
//! record (§4.5) falls out of the existing success/failure audit path
//! without any hook-specific plumbing there.

use crate::context::Context;
use crate::registry::Registry;
use claudebench_core::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A hook validation rule: inspects the call and either allows it
/// (`Ok(())`) or denies it (`Err` naming why). Registered once at startup
/// alongside `hook.pre_tool`; swapping the policy never touches dispatch,
/// middleware, or the handler body.
pub type PreToolPolicy = Arc<dyn Fn(&Context, &PreToolInput) -> Result<()> + Send + Sync>;

#[derive(Deserialize)]
pub struct PreToolInput {
    pub tool: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Serialize)]
struct PreToolOutput {
    allowed: bool,
}

/// Register `hook.pre_tool` with the always-allow policy — the default
/// for a deployment that hasn't wired a real rule set.
pub fn register(registry: &Registry) -> Result<()> {
    register_with_policy(registry, Arc::new(|_ctx, _input| Ok(())))
}

/// Register `hook.pre_tool` with a caller-supplied policy.
pub fn register_with_policy(registry: &Registry, policy: PreToolPolicy) -> Result<()> {
    registry.register(
        super::descriptor("hook.pre_tool", "Validate a tool invocation before it runs."),
        move |ctx: &Context, input: serde_json::Value| -> Result<serde_json::Value> {
            let raw: PreToolInput =
                serde_json::from_value(input).map_err(|e| claudebench_core::Error::InvalidInput {
                    field: "body".into(),
                    message: e.to_string(),
                })?;
            policy(ctx, &raw)?;
            Ok(serde_json::to_value(PreToolOutput { allowed: true })?)
        },
    )
}
