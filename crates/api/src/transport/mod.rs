//! Feature-gated network transport (§9): JSON-RPC 2.0 over HTTP POST to a
//! single endpoint, plus an SSE GET side channel for the event bus. Neither
//! endpoint is in scope for deep implementation detail per §1 ("specify
//! only their interface") — both are hand-rolled over `tokio`, matching the
//! minimal sidecar style a production HTTP layer in this codebase's family
//! uses rather than pulling in a routing framework for two routes.

mod http;
pub mod jsonrpc;
pub mod sse;

pub use jsonrpc::serve_jsonrpc;
pub use sse::serve_sse;
