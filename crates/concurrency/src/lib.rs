//! Single-writer atomic script executor.
//!
//! Per §9 "Script atomicity", the design constraint is an atomic multi-key
//! transition, not any particular mechanism — "server-side script, in-process
//! single-writer with key sharding, transactional store" are all acceptable.
//! `claudebench-storage`'s [`claudebench_storage::Store`] already serializes
//! every mutation through one exclusive `RwLock`; this crate builds the
//! "script" abstraction directly on top of holding that lock for an entire
//! validate-then-apply body, which is the simplest mechanism that satisfies
//! the isolation requirement for a single logical store (there is no
//! multi-branch or multi-shard case here, so the per-branch commit-lock
//! table an on-disk OCC engine would need collapses to the store's own
//! lock).
//!
//! A script is any closure `FnOnce(&StoreInner, i64) -> Result<(T, Vec<StoreOp>),
//! Error>`: it reads the current state, decides what to do, and either
//! returns the physical ops it needs applied or fails with no side effects
//! at all (§4.2 "script errors abort the transition with no side effects").
//! [`AtomicExecutor::execute`] holds the write lock across validation,
//! WAL append, and apply, so no other script or read observes an
//! intermediate state.

#![warn(missing_docs)]

pub mod executor;

pub use executor::AtomicExecutor;
