//! Write-ahead log and crash recovery for the `cb:` keyspace.
//!
//! Every atomic script in `claudebench-concurrency` produces a batch of
//! [`claudebench_storage::StoreOp`]s after validating its preconditions.
//! Before those ops are applied to the in-memory [`claudebench_storage::Store`],
//! they are appended to the write-ahead log here, so an unclean process exit
//! does not silently lose a committed script (§4.2/§5: "all state mutations
//! performed by a cancelled call are either fully committed via one script or
//! not performed"). On startup, [`recovery::recover`] replays the log into a
//! fresh store before the server accepts any request.

#![warn(missing_docs)]

pub mod error;
pub mod record;
pub mod recovery;
pub mod writer;

pub use error::WalError;
pub use record::WalRecord;
pub use recovery::{recover, RecoveryReport};
pub use writer::{NullWalWriter, WalWriter};
