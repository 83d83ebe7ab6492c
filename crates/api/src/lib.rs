//! `claudebench-api`: the registry, dispatcher, fixed middleware envelope,
//! and thin handler set (§4, §6, §8). Behind the `rpc`/`mcp` features, also
//! the JSON-RPC/SSE transport (§9).
//!
//! Everything here is wired against [`claudebench_engine::Services`] — the
//! crate has no opinion on how a process is booted, only on how one dispatch
//! runs once it has a `Services` bundle to run against.

#![warn(missing_docs)]

pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod handler;
pub mod handlers;
pub mod middleware;
pub mod registry;

#[cfg(any(feature = "rpc", feature = "mcp"))]
pub mod transport;

pub use context::Context;
pub use descriptor::HandlerDescriptor;
pub use dispatcher::Dispatcher;
pub use handler::Handler;
pub use registry::Registry;

use claudebench_core::Result;
use claudebench_engine::Services;

/// Build a fully wired dispatcher: a fresh registry with every first-class
/// handler registered, over the given service bundle.
pub fn build_dispatcher(services: Services) -> Result<Dispatcher> {
    let registry = Registry::new();
    handlers::register_all(&registry)?;
    Ok(Dispatcher::new(registry, services))
}
