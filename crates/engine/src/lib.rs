//! Process orchestration for ClaudeBench: recovery on boot, the shared
//! [`Services`] bundle, and the background sweepers that enforce liveness
//! and run the leader-gated cluster jobs described in §4.7.
//!
//! This crate owns nothing the `claudebench-api` dispatcher can't also
//! reach — it exists so the sweepers and the dispatcher agree on exactly
//! one [`AtomicExecutor`], one [`claudebench_primitives::MetricsRecorder`],
//! and one instance id representing this process.

#![warn(missing_docs)]

pub mod services;
pub mod runtime;
pub mod sweeper;

pub use runtime::Engine;
pub use services::Services;
pub use sweeper::Sweeper;
