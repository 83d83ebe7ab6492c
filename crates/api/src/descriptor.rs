//! Handler descriptors: `{event, inputShape, outputShape, persist, roles,
//! rateLimit, description}` per §3's "Handler descriptor" entity.
//!
//! `inputShape`/`outputShape` are realized as plain Rust types validated by
//! `serde` deserialization plus explicit range/length checks, the
//! "idiomatic Rust realization" SPEC_FULL.md §4 calls for rather than a
//! bespoke schema DSL — so a descriptor here carries no schema value at
//! all; the handler body's own `TryFrom<serde_json::Value>` impl for its
//! input type *is* the schema.

use claudebench_core::config::RateLimitConfig;

/// Registered once per event at startup, immutable thereafter.
#[derive(Clone)]
pub struct HandlerDescriptor {
    /// Dotted event name, e.g. `task.create`. Unique within the registry.
    pub event: &'static str,
    /// Whether a successful call should also write to the relational sink
    /// (§6 "Persistent state layout"). No relational sink exists in this
    /// workspace (out of scope per §1); the flag is still threaded through
    /// to the context so a handler can honor it if one is wired in later.
    pub persist: bool,
    /// Roles permitted to invoke this event, empty meaning unrestricted.
    pub roles: Vec<&'static str>,
    /// Per-event rate-limit override; `None` falls back to
    /// `ClaudeBenchConfig::rate_limit`.
    pub rate_limit: Option<RateLimitConfig>,
    /// Cache TTL in milliseconds; `None` means the cache middleware is
    /// skipped entirely for this event (cache is opt-in, per §4.4 step 2).
    pub cache_ttl_ms: Option<u64>,
    /// Value returned instead of an error when the circuit is `OPEN`/probe-
    /// exhausted or the body times out (§4.5). `None` means no fallback is
    /// configured and both middlewares propagate their error as usual.
    pub fallback: Option<serde_json::Value>,
    /// One-line human-readable description.
    pub description: &'static str,
}

impl HandlerDescriptor {
    /// Start a descriptor with the given event name and no options set.
    pub fn new(event: &'static str, description: &'static str) -> Self {
        Self {
            event,
            persist: false,
            roles: Vec::new(),
            rate_limit: None,
            cache_ttl_ms: None,
            fallback: None,
            description,
        }
    }

    /// Opt this event into read-through response caching.
    pub fn with_cache_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.cache_ttl_ms = Some(ttl_ms);
        self
    }

    /// Override the rate limit for this event.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Configure the value returned when the circuit rejects the call or the
    /// body times out, instead of propagating the error to the caller.
    pub fn with_fallback(mut self, fallback: serde_json::Value) -> Self {
        self.fallback = Some(fallback);
        self
    }
}
