//! The handler trait every registered event implements.

use crate::context::Context;
use claudebench_core::Result;

/// A handler body: reads/writes via `ctx.services`, publishes via
/// `ctx.publish`, and returns the JSON-shaped output. Never sees
/// transport specifics or middleware concerns — those live entirely in
/// [`crate::middleware`].
pub trait Handler: Send + Sync {
    /// Run the handler body against the validated input.
    fn call(&self, ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value>;
}

impl<F> Handler for F
where
    F: Fn(&Context, serde_json::Value) -> Result<serde_json::Value> + Send + Sync,
{
    fn call(&self, ctx: &Context, input: serde_json::Value) -> Result<serde_json::Value> {
        self(ctx, input)
    }
}
