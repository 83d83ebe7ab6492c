//! Data model, keyspace schema, and error taxonomy for ClaudeBench.
//!
//! This crate defines the types shared by every other crate in the
//! workspace: task and instance records, the `cb:`-prefixed key schema,
//! the unified error enum, the injectable clock, and runtime configuration.
//! It has no dependency on storage, concurrency, or transport — those
//! layers depend on `claudebench-core`, never the reverse.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod key;
pub mod task;
pub mod instance;
pub mod circuit;
pub mod value;

pub use clock::{Clock, SystemClock, TestClock};
pub use config::ClaudeBenchConfig;
pub use error::{Error, FailureKind, Result};
pub use ids::{EventId, InstanceId, TaskId};
pub use key::Key;
pub use task::{Task, TaskStatus};
pub use instance::{Instance, InstanceStatus};
pub use circuit::CircuitState;
pub use value::Value;
