//! Durability-layer error type.

use thiserror::Error;

/// Failures from appending to or replaying the write-ahead log.
#[derive(Debug, Error)]
pub enum WalError {
    /// The log file could not be opened, written, or fsynced.
    #[error("wal io error: {0}")]
    Io(#[from] std::io::Error),
    /// A record's checksum did not match its payload on replay; the log is
    /// truncated at this point and recovery proceeds with what validated.
    #[error("wal checksum mismatch at offset {offset}")]
    ChecksumMismatch {
        /// Byte offset of the corrupt record.
        offset: u64,
    },
    /// A record's payload failed to deserialize.
    #[error("wal record decode error: {0}")]
    Decode(String),
}

impl From<WalError> for claudebench_core::Error {
    fn from(e: WalError) -> Self {
        claudebench_core::Error::Wal(e.to_string())
    }
}
