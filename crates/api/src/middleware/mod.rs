//! The fixed middleware envelope from §4.5: composable `Handler → Handler`
//! transformers, assembled once per descriptor at [`crate::dispatcher::Dispatcher`]
//! construction in the order **rate-limit → timeout → circuit-breaker →
//! cache → audit → measured → body** (outermost first).
//!
//! Each gate middleware (rate-limit, timeout, circuit-breaker) audits its
//! own rejections directly — a rejection never reaches the generic `audit`
//! stage, since that stage sits innermost, after circuit/cache. Only calls
//! that reach the handler body are audited there.

pub mod audit;
pub mod cache;
pub mod circuit;
pub mod measured;
pub mod rate_limit;
pub mod timeout;

use crate::context::Context;
use crate::descriptor::HandlerDescriptor;
use crate::handler::Handler;
use claudebench_core::Result;
use std::sync::Arc;

/// One stage of the envelope, or the handler body itself: call it with the
/// context and (already-validated-by-the-body) input, get back the output.
pub type Next = Arc<dyn Fn(&Context, serde_json::Value) -> Result<serde_json::Value> + Send + Sync>;

/// Assemble the full envelope around `handler`, innermost to outermost.
pub fn compose(descriptor: &HandlerDescriptor, handler: Arc<dyn Handler>) -> Next {
    let body: Next = Arc::new(move |ctx, input| handler.call(ctx, input));
    let chain = measured::wrap(descriptor, body);
    let chain = audit::wrap(descriptor, chain);
    let chain = cache::wrap(descriptor, chain);
    let chain = circuit::wrap(descriptor, chain);
    let chain = timeout::wrap(descriptor, chain);
    rate_limit::wrap(descriptor, chain)
}
