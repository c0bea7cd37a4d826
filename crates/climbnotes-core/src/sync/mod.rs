//! Offline sync: merge, tombstones, cursor tracking, remote exchange.

mod apply;
mod cursor;
mod engine;
mod file_remote;
mod memory_remote;
mod merge;
mod remote;
mod renumber;
mod rows;
mod tombstone;

use thiserror::Error;

pub use apply::{apply_sync_rows, ApplyOutcome};
pub use cursor::{get_max_cursor, SyncCursor, SyncMeta};
pub use engine::{SyncEngine, SyncOptions, SyncReport, DEFAULT_PUSH_BATCH_SIZE};
pub use file_remote::FileRemote;
pub use memory_remote::MemoryRemote;
pub use merge::{is_incoming_newer, merge, merge_records, MergeCount, MergeSummary};
pub use remote::{PullResponse, PushConflict, PushResponse, SyncRemote};
pub use renumber::renumber_attempts;
pub use rows::{
    build_attempt_sync_row, build_gym_sync_row, build_route_sync_row, build_sync_rows_from_data,
    build_tombstone_row, sync_key_for,
};
pub use tombstone::{apply_tombstones, tombstone_applies, TombstoneOutcome};

/// Broad class of a remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Network or server hiccup; the same call may succeed later
    Transient,
    /// Credentials were rejected
    Unauthorized,
    /// The remote refused the request as malformed
    Rejected,
}

/// Failure reported by a [`SyncRemote`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TransportErrorKind::Transient,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TransportErrorKind::Unauthorized,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TransportErrorKind::Rejected,
        }
    }

    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_are_retryable() {
        assert!(TransportError::transient("timeout").is_retryable());
        assert!(!TransportError::unauthorized("expired token").is_retryable());
        assert!(!TransportError::rejected("bad payload").is_retryable());

        let error = crate::Error::from(TransportError::transient("offline"));
        assert!(error.is_retryable());
        assert_eq!(error.to_string(), "Sync transport error: offline");
    }
}
