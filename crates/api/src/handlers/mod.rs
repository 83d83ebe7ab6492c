//! The handler set (§6 plus the §8 C8 supplements): a small set of
//! first-class handlers whose logic is defined entirely by contract. Every
//! body here is intentionally thin — it reads/writes via
//! `claudebench-primitives` through `ctx.services` and publishes via the
//! event bus; none of it contains cross-cutting logic, which lives
//! entirely in [`crate::middleware`].

pub mod hook;
pub mod system;
pub mod task;

use crate::descriptor::HandlerDescriptor;
use crate::registry::Registry;
use claudebench_core::Result;

/// Register every first-class handler. Called once at process startup,
/// before the first `dispatch` call.
pub fn register_all(registry: &Registry) -> Result<()> {
    system::register(registry)?;
    task::register(registry)?;
    hook::register(registry)?;
    Ok(())
}

/// Shorthand used by each handler module's `register` function.
pub(crate) fn descriptor(event: &'static str, description: &'static str) -> HandlerDescriptor {
    HandlerDescriptor::new(event, description)
}
