//! Unified error type for ClaudeBench.
//!
//! `Error` is the single `Result` error type threaded through every crate
//! in the workspace. Variants map directly onto the error taxonomy: which
//! JSON-RPC code a failure surfaces as, and whether it counts against a
//! handler's circuit breaker.
//!
//! ```ignore
//! match result {
//!     Err(e) if e.circuit_kind().is_some() => { /* counts against the circuit */ }
//!     Err(Error::InvalidInput { .. }) => { /* -32602, never trips the circuit */ }
//!     Err(e) if e.is_retryable() => { /* safe for the client to retry */ }
//!     Ok(value) => { /* success */ }
//!     Err(e) => { /* -32603 */ }
//! }
//! ```

use thiserror::Error;

/// Result type alias for ClaudeBench operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How a failure should be classified by the circuit breaker middleware.
///
/// Input-validation errors are deliberately absent from this enum: they
/// never count against any circuit, per the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The handler body exceeded its wall-clock budget.
    Timeout,
    /// The handler body returned an unexpected internal failure.
    Error,
    /// The call was rejected before reaching the handler body (rate limit,
    /// open circuit, half-open probe cap).
    Rejection,
}

/// Unified error type for all ClaudeBench operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input failed schema or range validation at the dispatcher boundary.
    /// Surfaces as JSON-RPC `-32602`; never counts against a circuit.
    #[error("invalid input at {field}: {message}")]
    InvalidInput {
        /// The offending field path.
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// No handler is registered for the requested event.
    /// Surfaces as JSON-RPC `-32601`.
    #[error("method not found: {event}")]
    MethodNotFound {
        /// The unresolved event name.
        event: String,
    },

    /// A referenced entity (task, instance) does not exist.
    #[error("not found: {entity} {id}")]
    NotFound {
        /// Entity kind, e.g. "task" or "instance".
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// An operation was attempted from an invalid state
    /// (e.g. completing a task that is not `in_progress`).
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Human-readable reason.
        message: String,
    },

    /// Sliding-window rate limit exceeded for `(event, actor)`.
    #[error("rate limit exceeded: {limit} per {window_ms}ms, retry after {retry_after_ms}ms")]
    RateLimitExceeded {
        /// Configured limit.
        limit: u32,
        /// Configured window, in milliseconds.
        window_ms: u64,
        /// Milliseconds until the caller may retry.
        retry_after_ms: u64,
        /// Calls still admittable in the current window after this
        /// rejection — `0` whenever the limit has been reached, since the
        /// window is already at or past capacity by the time this error is
        /// raised.
        remaining: u32,
    },

    /// The circuit for this event is `OPEN` and no fallback is configured.
    #[error("circuit open for {event}")]
    CircuitOpen {
        /// The event whose circuit is open.
        event: String,
        /// Whether a fallback payload was returned instead of this error.
        fallback_returned: bool,
    },

    /// The circuit for this event is `HALF_OPEN` and the probe budget is exhausted.
    #[error("half-open probe limit reached for {event}")]
    HalfOpenLimit {
        /// The event whose half-open probe budget is exhausted.
        event: String,
    },

    /// The handler body did not complete within its configured budget.
    /// Counts as a circuit failure of kind `timeout`.
    #[error("timeout after {limit_ms}ms")]
    Timeout {
        /// Configured wall-clock budget, in milliseconds.
        limit_ms: u64,
    },

    /// A concurrent mutation conflicted with this one at the script level
    /// (double-claim, duplicate registration under a race).
    #[error("conflict: {message}")]
    Conflict {
        /// Human-readable reason.
        message: String,
    },

    /// Storage-layer failure (I/O, corruption).
    #[error("storage error: {0}")]
    Storage(String),

    /// Write-ahead log failure.
    #[error("wal error: {0}")]
    Wal(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other unexpected internal failure. Counts as a circuit failure
    /// of kind `error`.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify this error for the circuit breaker, or `None` if it must
    /// never count against a circuit (invalid input, not-found, rejections
    /// that already happened before the body ran).
    pub fn circuit_kind(&self) -> Option<FailureKind> {
        match self {
            Error::InvalidInput { .. } => None,
            Error::MethodNotFound { .. } => None,
            Error::NotFound { .. } => None,
            Error::RateLimitExceeded { .. } => Some(FailureKind::Rejection),
            Error::CircuitOpen { .. } => Some(FailureKind::Rejection),
            Error::HalfOpenLimit { .. } => Some(FailureKind::Rejection),
            Error::Timeout { .. } => Some(FailureKind::Timeout),
            Error::PreconditionFailed { .. } => Some(FailureKind::Error),
            Error::Conflict { .. } => Some(FailureKind::Error),
            Error::Storage(_) | Error::Wal(_) | Error::Serialization(_) | Error::Internal(_) => {
                Some(FailureKind::Error)
            }
        }
    }

    /// Whether a client may safely retry this call without risking a
    /// duplicate side effect.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimitExceeded { .. }
                | Error::CircuitOpen { .. }
                | Error::HalfOpenLimit { .. }
                | Error::Timeout { .. }
        )
    }

    /// The JSON-RPC 2.0 error code this error surfaces as.
    pub fn json_rpc_code(&self) -> i64 {
        match self {
            Error::MethodNotFound { .. } => -32601,
            Error::InvalidInput { .. } => -32602,
            Error::RateLimitExceeded { .. } => -32000,
            Error::CircuitOpen { .. } | Error::HalfOpenLimit { .. } => -32001,
            Error::Timeout { .. } => -32002,
            Error::NotFound { .. }
            | Error::PreconditionFailed { .. }
            | Error::Conflict { .. }
            | Error::Storage(_)
            | Error::Wal(_)
            | Error::Serialization(_)
            | Error::Internal(_) => -32603,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_never_trips_circuit() {
        let e = Error::InvalidInput {
            field: "text".into(),
            message: "too long".into(),
        };
        assert_eq!(e.circuit_kind(), None);
        assert_eq!(e.json_rpc_code(), -32602);
    }

    #[test]
    fn not_found_never_trips_circuit() {
        let e = Error::NotFound {
            entity: "task",
            id: "t-1".into(),
        };
        assert_eq!(e.circuit_kind(), None);
    }

    #[test]
    fn timeout_counts_as_timeout_kind() {
        let e = Error::Timeout { limit_ms: 30 };
        assert_eq!(e.circuit_kind(), Some(FailureKind::Timeout));
        assert_eq!(e.json_rpc_code(), -32002);
        assert!(e.is_retryable());
    }

    #[test]
    fn circuit_open_is_rejection_and_retryable() {
        let e = Error::CircuitOpen {
            event: "task.create".into(),
            fallback_returned: false,
        };
        assert_eq!(e.circuit_kind(), Some(FailureKind::Rejection));
        assert_eq!(e.json_rpc_code(), -32001);
        assert!(e.is_retryable());
    }

    #[test]
    fn internal_errors_are_not_retryable() {
        let e = Error::Internal("boom".into());
        assert_eq!(e.circuit_kind(), Some(FailureKind::Error));
        assert!(!e.is_retryable());
    }
}
