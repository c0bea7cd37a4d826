//! Push/pull cycle between the local database and a remote store

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::db::{
    ConflictRepository, DataRepository, SqliteConflictRepository, SqliteDataRepository,
    SqliteSyncMetaRepository, SqliteSyncQueueRepository, SqliteTombstoneRepository,
    SyncMetaRepository, SyncQueueRepository, TombstoneRepository,
};
use crate::models::SyncRow;
use crate::services::DatabaseService;
use crate::state::SyncState;
use crate::util::now_ms;
use crate::Result;

use super::apply::apply_sync_rows;
use super::cursor::{get_max_cursor, SyncCursor, SyncMeta};
use super::remote::SyncRemote;

/// Rows offered to the remote per push call
pub const DEFAULT_PUSH_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Owner of the queue, tombstone log and cursor
    pub user_key: String,
    pub push_batch_size: usize,
}

impl SyncOptions {
    pub fn new(user_key: impl Into<String>) -> Self {
        Self {
            user_key: user_key.into(),
            push_batch_size: DEFAULT_PUSH_BATCH_SIZE,
        }
    }
}

/// Counters from one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows the remote accepted
    pub pushed: usize,
    pub push_skipped: usize,
    /// Rows the remote refused because it held a newer version
    pub conflicts: usize,
    pub pulled: usize,
    /// Local records added or updated by the pull
    pub applied_records: usize,
    /// Pulled tombstones that deleted a local record
    pub applied_tombstones: usize,
    /// Cursor stored after the pull
    pub cursor: Option<SyncCursor>,
}

/// Drives push and pull for one user against one remote.
pub struct SyncEngine<R: SyncRemote> {
    service: DatabaseService,
    remote: R,
    options: SyncOptions,
    state: Mutex<SyncState>,
}

impl<R: SyncRemote> SyncEngine<R> {
    pub fn new(service: DatabaseService, remote: R, options: SyncOptions) -> Self {
        Self {
            service,
            remote,
            options,
            state: Mutex::new(SyncState::Offline),
        }
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub async fn state(&self) -> SyncState {
        *self.state.lock().await
    }

    /// Push pending local changes, then pull remote changes.
    ///
    /// A failure leaves unacknowledged rows queued and the cursor where it
    /// was, so the cycle can simply be retried.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.set_state(SyncState::Syncing).await;
        let result = self.run_cycle().await;
        match &result {
            Ok(report) => {
                tracing::info!(
                    "Sync finished: pushed {}, pulled {}, {} conflicts",
                    report.pushed,
                    report.pulled,
                    report.conflicts
                );
                self.set_state(SyncState::Synced).await;
            }
            Err(error) if error.is_retryable() => {
                tracing::warn!("Sync interrupted, will retry: {error}");
                self.set_state(SyncState::Offline).await;
            }
            Err(error) => {
                tracing::error!("Sync failed: {error}");
                self.set_state(SyncState::Error).await;
            }
        }
        result
    }

    async fn run_cycle(&self) -> Result<SyncReport> {
        let mut report = self.push().await?;
        let pulled = self.pull().await?;
        report.pulled = pulled.pulled;
        report.applied_records = pulled.applied_records;
        report.applied_tombstones = pulled.applied_tombstones;
        report.cursor = pulled.cursor;
        Ok(report)
    }

    /// Offer queued rows and logged tombstones to the remote in batches.
    ///
    /// Each answered batch is acknowledged on its own; a row edited again
    /// while its batch was in flight stays queued.
    pub async fn push(&self) -> Result<SyncReport> {
        let user_key = self.options.user_key.as_str();
        let pending = self
            .service
            .transaction(|conn| {
                let mut pending = SqliteSyncQueueRepository::new(conn).read_keyed(user_key)?;
                pending.extend(SqliteTombstoneRepository::new(conn).read_keyed(user_key)?);
                Ok(pending)
            })
            .await?;

        let mut report = SyncReport::default();
        if pending.is_empty() {
            tracing::debug!("Nothing to push");
            return Ok(report);
        }

        for batch in pending.chunks(self.options.push_batch_size.max(1)) {
            let rows: Vec<SyncRow> = batch.iter().map(|(_, row)| row.clone()).collect();
            let response = self.remote.push(&rows).await?;

            self.service
                .transaction(|conn| {
                    let queue = SqliteSyncQueueRepository::new(conn);
                    let acked = acknowledged_keys(batch, &queue.read_keyed(user_key)?);
                    queue.remove_sync_rows(user_key, &acked)?;

                    let log = SqliteTombstoneRepository::new(conn);
                    let acked = acknowledged_keys(batch, &log.read_keyed(user_key)?);
                    log.remove_tombstones(user_key, &acked)?;

                    SqliteConflictRepository::new(conn).record_conflicts(
                        user_key,
                        &response.conflicts,
                        now_ms(),
                    )
                })
                .await?;

            report.pushed += response.applied;
            report.push_skipped += response.skipped;
            report.conflicts += response.conflicts.len();
        }

        if report.conflicts > 0 {
            tracing::warn!("Remote refused {} stale rows", report.conflicts);
        }
        Ok(report)
    }

    /// Fetch rows past the stored cursor and apply them locally.
    pub async fn pull(&self) -> Result<SyncReport> {
        let user_key = self.options.user_key.as_str();
        let meta = self.service.read_sync_meta(user_key).await?;
        let response = self.remote.pull(meta.cursor.as_ref()).await?;
        tracing::debug!(
            "Pulled {} rows at server time {}",
            response.rows.len(),
            response.server_time
        );

        self.service
            .transaction(|conn| {
                let now = now_ms();
                let data_repo = SqliteDataRepository::new(conn);
                let outcome = apply_sync_rows(&data_repo.load()?, &response.rows, now);
                if outcome.changed() {
                    data_repo.save(&outcome.data)?;
                }

                let cursor = advance_cursor(meta.cursor.clone(), get_max_cursor(&response.rows));
                SqliteSyncMetaRepository::new(conn).write_sync_meta(
                    user_key,
                    &SyncMeta {
                        cursor: cursor.clone(),
                        last_synced_at: Some(now),
                    },
                )?;

                Ok(SyncReport {
                    pulled: response.rows.len(),
                    applied_records: outcome.merge.total_changes(),
                    applied_tombstones: outcome.tombstones.applied,
                    cursor,
                    ..SyncReport::default()
                })
            })
            .await
    }

    async fn set_state(&self, state: SyncState) {
        *self.state.lock().await = state;
    }
}

/// Keys from a pushed batch whose stored row is still the one that was sent
fn acknowledged_keys(batch: &[(String, SyncRow)], stored: &[(String, SyncRow)]) -> Vec<String> {
    let stored: HashMap<&str, &SyncRow> = stored
        .iter()
        .map(|(key, row)| (key.as_str(), row))
        .collect();
    batch
        .iter()
        .filter(|(key, sent)| {
            stored
                .get(key.as_str())
                .is_some_and(|current| *current == sent)
        })
        .map(|(key, _)| key.clone())
        .collect()
}

/// The cursor never moves backwards.
fn advance_cursor(stored: Option<SyncCursor>, pulled: Option<SyncCursor>) -> Option<SyncCursor> {
    match (stored, pulled) {
        (Some(stored), Some(pulled)) => {
            let pulled_is_later = (pulled.last_sync_at_ms, pulled.last_sync_key.as_str())
                > (stored.last_sync_at_ms, stored.last_sync_key.as_str());
            Some(if pulled_is_later { pulled } else { stored })
        }
        (stored, pulled) => pulled.or(stored),
    }
}
