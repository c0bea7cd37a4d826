//! Full apply pipeline for a batch of wire rows

use crate::models::{DataStore, SyncRow};
use crate::normalize::parse_batch;

use super::merge::{merge, MergeSummary};
use super::tombstone::{apply_tombstones, TombstoneOutcome};

/// Store produced by [`apply_sync_rows`] plus what happened on the way
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub data: DataStore,
    /// Tombstone rows in the batch
    pub tombstone_count: usize,
    /// Live gym/route/attempt rows in the batch
    pub record_count: usize,
    /// Rows rejected by the normalizer
    pub skipped_rows: usize,
    pub merge: MergeSummary,
    pub tombstones: TombstoneOutcome,
}

impl ApplyOutcome {
    /// Whether the resulting store differs from the input store
    pub const fn changed(&self) -> bool {
        self.merge.total_changes() > 0 || self.tombstones.applied > 0
    }
}

/// Apply pulled or imported rows to `current` without touching it.
///
/// Live rows are merged first and tombstones second, so a delete in the
/// batch wins over a record the same batch inserts regardless of row order.
/// `now_ms` stands in for missing creation times.
pub fn apply_sync_rows(current: &DataStore, rows: &[SyncRow], now_ms: i64) -> ApplyOutcome {
    let mut batch = parse_batch(rows, now_ms);
    let tombstone_list = std::mem::take(&mut batch.tombstones);
    let tombstone_count = tombstone_list.len();
    let record_count = batch.record_count();
    let skipped_rows = batch.skipped_rows;

    let mut merge_summary = merge(current, batch);
    let mut data = std::mem::take(&mut merge_summary.data);
    let tombstones = apply_tombstones(&mut data, &tombstone_list);

    tracing::debug!(
        "Applied {record_count} records and {tombstone_count} tombstones ({skipped_rows} rows skipped)"
    );

    ApplyOutcome {
        data,
        tombstone_count,
        record_count,
        skipped_rows,
        merge: merge_summary,
        tombstones,
    }
}
