//! In-process remote store with server-side merge semantics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::models::SyncRow;
use crate::normalize::{canonicalize, rows_equal};
use crate::util::{format_timestamp_ms, now_ms, parse_timestamp_ms};

use super::remote::{PullResponse, PushConflict, PushResponse, SyncRemote};
use super::{SyncCursor, TransportError};

/// Row as held by the remote, stamped with server and client clocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(super) struct StoredRow {
    pub row: SyncRow,
    /// Client timestamp the row was accepted with
    pub client_updated_at_ms: i64,
}

/// Server-side state of one user's rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(super) struct RemoteState {
    #[serde(default)]
    pub rows: BTreeMap<String, StoredRow>,
    /// Last server timestamp handed out; each push gets a later one
    #[serde(default)]
    pub clock_ms: i64,
}

impl RemoteState {
    fn tick(&mut self) -> i64 {
        self.clock_ms = now_ms().max(self.clock_ms + 1);
        self.clock_ms
    }

    pub fn pull(&self, cursor: Option<&SyncCursor>) -> PullResponse {
        let since = cursor.map(|cursor| cursor.last_sync_at_ms);
        let mut rows: Vec<&SyncRow> = self
            .rows
            .values()
            .map(|stored| &stored.row)
            .filter(|row| {
                since.is_none_or(|since| row.updated_at_ms.is_some_and(|ms| ms >= since))
            })
            .collect();
        rows.sort_by(|left, right| {
            left.updated_at_ms
                .cmp(&right.updated_at_ms)
                .then_with(|| left.sync_key.cmp(&right.sync_key))
        });
        PullResponse {
            rows: rows.into_iter().cloned().collect(),
            server_time: format_timestamp_ms(now_ms().max(self.clock_ms)),
        }
    }

    /// Apply pushed rows one by one.
    ///
    /// Older client timestamps are conflicts. On equal timestamps a
    /// tombstone replaces a live row, a live row over a tombstone is a
    /// conflict, and anything else is skipped.
    pub fn push(&mut self, rows: &[SyncRow]) -> PushResponse {
        let now = self.tick();
        let now_iso = format_timestamp_ms(now);
        let mut response = PushResponse {
            server_time: now_iso.clone(),
            ..PushResponse::default()
        };

        for row in rows {
            let Ok(normalized) = canonicalize(row) else {
                response.skipped += 1;
                continue;
            };
            let Some(sync_key) = normalized.identity_key() else {
                response.skipped += 1;
                continue;
            };
            let incoming_is_tombstone = normalized
                .parsed_type()
                .is_some_and(|record_type| record_type.is_tombstone());

            let existing = self.rows.get(&sync_key);
            if existing.is_some_and(|stored| rows_equal(&stored.row, &normalized)) {
                response.skipped += 1;
                continue;
            }

            let client_ms = normalized
                .updated_at
                .as_deref()
                .or(normalized.created_at.as_deref())
                .and_then(parse_timestamp_ms)
                .unwrap_or(now);

            if let Some(stored) = existing {
                let existing_is_tombstone = stored
                    .row
                    .parsed_type()
                    .is_some_and(|record_type| record_type.is_tombstone());
                if client_ms < stored.client_updated_at_ms
                    || (client_ms == stored.client_updated_at_ms
                        && !incoming_is_tombstone
                        && existing_is_tombstone)
                {
                    response.conflicts.push(PushConflict {
                        sync_key,
                        record_type: normalized.record_type.clone(),
                    });
                    continue;
                }
                if client_ms == stored.client_updated_at_ms
                    && (!incoming_is_tombstone || existing_is_tombstone)
                {
                    response.skipped += 1;
                    continue;
                }
            }

            let created_at = existing
                .and_then(|stored| stored.row.created_at.clone())
                .or_else(|| normalized.created_at.clone())
                .unwrap_or_else(|| now_iso.clone());
            let row = SyncRow {
                sync_key: Some(sync_key.clone()),
                created_at: Some(created_at),
                updated_at: Some(now_iso.clone()),
                updated_at_ms: Some(now),
                ..normalized
            };
            self.rows.insert(
                sync_key,
                StoredRow {
                    row,
                    client_updated_at_ms: client_ms,
                },
            );
            response.applied += 1;
        }

        tracing::debug!(
            "Remote push: {} applied, {} skipped, {} conflicts",
            response.applied,
            response.skipped,
            response.conflicts.len()
        );
        response
    }
}

/// Remote store living in memory, shared by every caller of one instance.
///
/// Failures can be injected to exercise retry paths.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<RemoteState>,
    failure: Mutex<Option<TransportError>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `error` until cleared.
    pub async fn fail_with(&self, error: Option<TransportError>) {
        *self.failure.lock().await = error;
    }

    /// Every row currently held, ordered by sync key
    pub async fn rows(&self) -> Vec<SyncRow> {
        let state = self.state.lock().await;
        state.rows.values().map(|stored| stored.row.clone()).collect()
    }

    async fn check_failure(&self) -> Result<(), TransportError> {
        match self.failure.lock().await.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl SyncRemote for MemoryRemote {
    async fn pull(&self, cursor: Option<&SyncCursor>) -> Result<PullResponse, TransportError> {
        self.check_failure().await?;
        let state = self.state.lock().await;
        Ok(state.pull(cursor))
    }

    async fn push(&self, rows: &[SyncRow]) -> Result<PushResponse, TransportError> {
        self.check_failure().await?;
        let mut state = self.state.lock().await;
        Ok(state.push(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordType;
    use pretty_assertions::assert_eq;

    fn gym_row(name: &str, updated_at: &str) -> SyncRow {
        SyncRow {
            gym_name: Some(name.to_string()),
            created_at: Some("2024-01-01T00:00:00.000Z".to_string()),
            updated_at: Some(updated_at.to_string()),
            ..SyncRow::of_type(RecordType::Gym)
        }
    }

    fn gym_tombstone(name: &str, updated_at: &str) -> SyncRow {
        SyncRow {
            gym_name: Some(name.to_string()),
            updated_at: Some(updated_at.to_string()),
            ..SyncRow::of_type(RecordType::TombstoneGym)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_then_pull_returns_server_stamped_rows() {
        let remote = MemoryRemote::new();
        let response = remote
            .push(&[gym_row(" Base ", "2024-01-02T00:00:00.000Z")])
            .await
            .unwrap();
        assert_eq!(response.applied, 1);

        let pulled = remote.pull(None).await.unwrap();
        assert_eq!(pulled.rows.len(), 1);
        let row = &pulled.rows[0];
        assert_eq!(row.sync_key.as_deref(), Some("gym:Base"));
        assert_eq!(row.created_at.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert!(row.updated_at_ms.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_identical_rows_are_skipped() {
        let remote = MemoryRemote::new();
        let row = gym_row("Base", "2024-01-02T00:00:00.000Z");
        remote.push(&[row.clone()]).await.unwrap();
        let response = remote
            .push(&[gym_row("Base", "2024-01-05T00:00:00.000Z")])
            .await
            .unwrap();
        assert_eq!(response.skipped, 1);
        assert_eq!(response.applied, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_older_client_rows_conflict() {
        let remote = MemoryRemote::new();
        remote
            .push(&[gym_tombstone("Base", "2024-03-01T00:00:00.000Z")])
            .await
            .unwrap();
        let response = remote
            .push(&[gym_row("Base", "2024-02-01T00:00:00.000Z")])
            .await
            .unwrap();
        assert_eq!(
            response.conflicts,
            vec![PushConflict {
                sync_key: "gym:Base".to_string(),
                record_type: "gym".to_string(),
            }]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_equal_timestamps_favor_tombstones() {
        let at = "2024-03-01T00:00:00.000Z";

        let remote = MemoryRemote::new();
        remote.push(&[gym_row("Base", at)]).await.unwrap();
        let response = remote.push(&[gym_tombstone("Base", at)]).await.unwrap();
        assert_eq!(response.applied, 1);
        assert_eq!(remote.rows().await[0].record_type, "tombstone_gym");

        let response = remote.push(&[gym_row("Base", at)]).await.unwrap();
        assert_eq!(response.conflicts.len(), 1);
        assert_eq!(remote.rows().await[0].record_type, "tombstone_gym");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_rows_are_skipped() {
        let remote = MemoryRemote::new();
        let response = remote
            .push(&[SyncRow::of_type(RecordType::Route), SyncRow::default()])
            .await
            .unwrap();
        assert_eq!(response.skipped, 2);
        assert!(remote.rows().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_is_inclusive_and_ordered() {
        let remote = MemoryRemote::new();
        remote
            .push(&[gym_row("B", "2024-01-02T00:00:00.000Z")])
            .await
            .unwrap();
        remote
            .push(&[gym_row("A", "2024-01-02T00:00:00.000Z")])
            .await
            .unwrap();
        let all = remote.pull(None).await.unwrap().rows;
        let first_ms = all[0].updated_at_ms.unwrap();
        let last = all.last().unwrap();

        let cursor = SyncCursor::new(
            last.updated_at_ms.unwrap(),
            last.sync_key.clone().unwrap(),
        );
        let since = remote.pull(Some(&cursor)).await.unwrap().rows;
        assert!(since.iter().any(|row| row.sync_key == last.sync_key));
        assert!(since
            .iter()
            .all(|row| row.updated_at_ms.unwrap() >= first_ms));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_back_to_back_pushes_get_distinct_server_times() {
        let remote = MemoryRemote::new();
        for name in ["A", "B", "C"] {
            remote
                .push(&[gym_row(name, "2024-01-02T00:00:00.000Z")])
                .await
                .unwrap();
        }
        let stamps: Vec<i64> = remote
            .pull(None)
            .await
            .unwrap()
            .rows
            .iter()
            .map(|row| row.updated_at_ms.unwrap())
            .collect();
        assert_eq!(stamps.len(), 3);
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_injected_failure_blocks_calls() {
        let remote = MemoryRemote::new();
        remote
            .fail_with(Some(TransportError::transient("offline")))
            .await;
        assert!(remote.pull(None).await.is_err());
        remote.fail_with(None).await;
        assert!(remote.pull(None).await.is_ok());
    }
}
