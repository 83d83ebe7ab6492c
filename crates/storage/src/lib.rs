//! The `cb:` keyspace's physical backing store.
//!
//! A single in-process [`Store`] holds every key as one of a handful of
//! typed shapes (`Record`). Callers never reach for an interior lock
//! themselves for single-step queries; atomic multi-step operations take
//! the store's exclusive lock directly (`claudebench-concurrency` builds
//! on [`Store::write_lock`] to interleave a write-ahead log append between
//! validation and application).

#![warn(missing_docs)]

pub mod op;
pub mod record;
pub mod store;
pub mod ttl;

pub use op::StoreOp;
pub use record::{Record, StreamEntry, ZScore};
pub use store::{Store, StoreInner};
pub use ttl::TtlIndex;
