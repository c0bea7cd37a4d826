//! Incremental pull cursor

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::SyncRow;

/// Position of the newest row seen from the remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub last_sync_at_ms: i64,
    pub last_sync_key: String,
}

impl SyncCursor {
    pub fn new(last_sync_at_ms: i64, last_sync_key: impl Into<String>) -> Self {
        Self {
            last_sync_at_ms,
            last_sync_key: last_sync_key.into(),
        }
    }

    fn cmp_position(&self, ms: i64, key: &str) -> Ordering {
        self.last_sync_at_ms
            .cmp(&ms)
            .then_with(|| self.last_sync_key.as_str().cmp(key))
    }
}

/// Persisted per-user sync bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    pub cursor: Option<SyncCursor>,
    /// When the last successful cycle finished (Unix ms)
    pub last_synced_at: Option<i64>,
}

/// Greatest `(timestamp, key)` among `rows`, or `None` when no row has both.
///
/// Timestamps compare numerically and exact ties go to the lexicographically
/// greater key.
pub fn get_max_cursor(rows: &[SyncRow]) -> Option<SyncCursor> {
    let mut best: Option<SyncCursor> = None;
    for row in rows {
        let (Some(ms), Some(key)) = (row.timestamp_ms(), row.cursor_key()) else {
            continue;
        };
        let is_greater = best
            .as_ref()
            .is_none_or(|current| current.cmp_position(ms, &key) == Ordering::Less);
        if is_greater {
            best = Some(SyncCursor::new(ms, key));
        }
    }
    best
}
