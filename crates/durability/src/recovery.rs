//! Replay the write-ahead log into a fresh store on startup.

use crate::error::WalError;
use crate::record::WalRecord;
use byteorder::{LittleEndian, ReadBytesExt};
use claudebench_storage::Store;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

/// Outcome of replaying a log file.
pub struct RecoveryReport {
    /// The rebuilt store, with every successfully-validated record applied.
    pub store: Store,
    /// Highest sequence number replayed, or 0 if the log was empty/absent.
    /// A resumed [`crate::WalWriter`] should start at `last_seq + 1`.
    pub last_seq: u64,
    /// Number of records replayed.
    pub records_replayed: usize,
}

/// Read every record from `path` and replay its ops into a fresh [`Store`].
///
/// A missing file is treated as an empty log (first startup). A record
/// whose checksum fails to validate truncates the log at that point —
/// the spec requires no interleaving between scripts, but makes no promise
/// about a record torn by a mid-write crash, so recovery favors "replay
/// everything provably committed" over refusing to start.
pub fn recover(path: impl AsRef<Path>) -> Result<RecoveryReport, WalError> {
    let store = Store::new();
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(RecoveryReport {
                store,
                last_seq: 0,
                records_replayed: 0,
            });
        }
        Err(e) => return Err(e.into()),
    };
    let mut reader = BufReader::new(file);
    let mut last_seq = 0u64;
    let mut records_replayed = 0usize;

    loop {
        let len = match reader.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let crc = match reader.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let mut payload = vec![0u8; len as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                tracing::warn!("wal truncated mid-record, stopping replay");
                break;
            }
            Err(e) => return Err(e.into()),
        }
        if crc32fast::hash(&payload) != crc {
            tracing::warn!("wal checksum mismatch, stopping replay at this record");
            break;
        }
        let record = WalRecord::from_payload(&payload)
            .map_err(|e| WalError::Decode(e.to_string()))?;
        {
            let mut guard = store.write_lock();
            for op in &record.ops {
                guard.apply(op);
            }
        }
        last_seq = record.seq;
        records_replayed += 1;
    }

    {
        let mut guard = store.write_lock();
        let floor = guard.max_zset_seq();
        guard.resume_zset_seq_past(floor);
    }

    tracing::info!(records_replayed, last_seq, "wal recovery complete");
    Ok(RecoveryReport {
        store,
        last_seq,
        records_replayed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::WalWriter;
    use claudebench_core::config::DurabilityMode;
    use claudebench_storage::StoreOp;

    #[test]
    fn recovers_empty_store_when_log_absent() {
        let dir = tempfile::tempdir().unwrap();
        let report = recover(dir.path().join("missing.log")).unwrap();
        assert_eq!(report.last_seq, 0);
        assert_eq!(report.records_replayed, 0);
    }

    #[test]
    fn replays_committed_ops_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("wal.log");
        {
            let mut writer = WalWriter::open(&log_path, DurabilityMode::Sync).unwrap();
            writer
                .append(
                    "TASK_CREATE",
                    vec![StoreOp::SetString {
                        key: "cb:task:t-1".into(),
                        value: "pending".into(),
                        expire_at_ms: None,
                    }],
                    1_000,
                )
                .unwrap();
            writer
                .append(
                    "TASK_CLAIM",
                    vec![StoreOp::SetString {
                        key: "cb:task:t-1".into(),
                        value: "in_progress".into(),
                        expire_at_ms: None,
                    }],
                    2_000,
                )
                .unwrap();
        }
        let report = recover(&log_path).unwrap();
        assert_eq!(report.records_replayed, 2);
        assert_eq!(report.last_seq, 2);
        assert_eq!(
            report.store.read_lock().get_string("cb:task:t-1", 0),
            Some("in_progress")
        );
    }
}
