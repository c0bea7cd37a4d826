//! Outbox of local changes awaiting push

use crate::error::Result;
use crate::models::SyncRow;
use crate::normalize::normalize_row;
use crate::util::now_ms;
use rusqlite::Connection;

use super::outbox::SYNC_QUEUE;

/// Trait for the per-user outbox
///
/// Entries are keyed `gym:<name>`, `route:<route_id>` or
/// `attempt:<attempt_id>`; a later row for the same key replaces the earlier
/// one in place.
pub trait SyncQueueRepository {
    /// Queue rows and return the whole queue afterwards.
    ///
    /// Tombstones and rows without a derivable key are dropped.
    fn add_sync_rows(&self, user_key: &str, rows: &[SyncRow]) -> Result<Vec<SyncRow>>;

    /// Remove acknowledged keys and return the remaining queue
    fn remove_sync_rows(&self, user_key: &str, sync_keys: &[String]) -> Result<Vec<SyncRow>>;

    /// Pending rows in first-queued order
    fn read_sync_queue(&self, user_key: &str) -> Result<Vec<SyncRow>>;

    /// Pending rows with their keys
    fn read_keyed(&self, user_key: &str) -> Result<Vec<(String, SyncRow)>>;

    fn clear_sync_queue(&self, user_key: &str) -> Result<usize>;

    fn queue_len(&self, user_key: &str) -> Result<usize>;
}

/// `SQLite` implementation of `SyncQueueRepository`
pub struct SqliteSyncQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

/// Queue key for a live row, after normalization
pub fn queue_entry(row: &SyncRow) -> Option<(String, SyncRow)> {
    let normalized = normalize_row(row)?;
    if normalized.parsed_type()?.is_tombstone() {
        return None;
    }
    let key = normalized.identity_key()?;
    Some((key, normalized))
}

impl SyncQueueRepository for SqliteSyncQueueRepository<'_> {
    fn add_sync_rows(&self, user_key: &str, rows: &[SyncRow]) -> Result<Vec<SyncRow>> {
        let entries: Vec<_> = rows.iter().filter_map(queue_entry).collect();
        if entries.len() < rows.len() {
            tracing::debug!(
                "Dropped {} rows without a queue key",
                rows.len() - entries.len()
            );
        }
        SYNC_QUEUE.upsert(self.conn, user_key, &entries, now_ms())?;
        self.read_sync_queue(user_key)
    }

    fn remove_sync_rows(&self, user_key: &str, sync_keys: &[String]) -> Result<Vec<SyncRow>> {
        SYNC_QUEUE.remove(self.conn, user_key, sync_keys)?;
        self.read_sync_queue(user_key)
    }

    fn read_sync_queue(&self, user_key: &str) -> Result<Vec<SyncRow>> {
        Ok(self
            .read_keyed(user_key)?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    fn read_keyed(&self, user_key: &str) -> Result<Vec<(String, SyncRow)>> {
        SYNC_QUEUE.read(self.conn, user_key)
    }

    fn clear_sync_queue(&self, user_key: &str) -> Result<usize> {
        SYNC_QUEUE.clear(self.conn, user_key)
    }

    fn queue_len(&self, user_key: &str) -> Result<usize> {
        SYNC_QUEUE.count(self.conn, user_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::RecordType;
    use pretty_assertions::assert_eq;
    use rusqlite::params;
    use tempfile::tempdir;

    fn gym(name: &str, updated_at: &str) -> SyncRow {
        SyncRow {
            gym_name: Some(name.to_string()),
            updated_at: Some(updated_at.to_string()),
            ..SyncRow::of_type(RecordType::Gym)
        }
    }

    fn attempt(id: &str, notes: &str) -> SyncRow {
        SyncRow {
            attempt_id: Some(id.to_string()),
            route_id: Some("r1".to_string()),
            notes: Some(notes.to_string()),
            ..SyncRow::of_type(RecordType::Attempt)
        }
    }

    #[test]
    fn test_later_row_replaces_earlier_in_place() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncQueueRepository::new(db.connection());

        repo.add_sync_rows("u1", &[attempt("a1", "first"), gym("Base", "2024-01-01")])
            .unwrap();
        let queue = repo.add_sync_rows("u1", &[attempt("a1", "second")]).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].notes.as_deref(), Some("second"));
        assert_eq!(queue[1].gym_name.as_deref(), Some("Base"));
    }

    #[test]
    fn test_rows_without_key_and_tombstones_are_dropped() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncQueueRepository::new(db.connection());

        let queue = repo
            .add_sync_rows(
                "u1",
                &[
                    SyncRow::of_type(RecordType::Gym),
                    SyncRow {
                        gym_name: Some("Base".to_string()),
                        ..SyncRow::of_type(RecordType::TombstoneGym)
                    },
                    SyncRow {
                        record_type: " ROUTE ".to_string(),
                        route_id: Some("r1".to_string()),
                        ..SyncRow::default()
                    },
                ],
            )
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].record_type, "route");
    }

    #[test]
    fn test_remove_and_clear() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        repo.add_sync_rows(
            "u1",
            &[attempt("a1", "x"), attempt("a2", "y"), gym("Base", "2024-01-03")],
        )
        .unwrap();

        let remaining = repo
            .remove_sync_rows("u1", &["attempt:a1".to_string(), "gym:Base".to_string()])
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].attempt_id.as_deref(), Some("a2"));

        assert_eq!(repo.clear_sync_queue("u1").unwrap(), 1);
        assert!(repo.read_sync_queue("u1").unwrap().is_empty());
    }

    #[test]
    fn test_queues_are_per_user() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        repo.add_sync_rows("u1", &[attempt("a1", "x")]).unwrap();
        repo.add_sync_rows("u2", &[attempt("a1", "y")]).unwrap();

        assert_eq!(repo.queue_len("u1").unwrap(), 1);
        assert_eq!(
            repo.read_sync_queue("u2").unwrap()[0].notes.as_deref(),
            Some("y")
        );
    }

    #[test]
    fn test_queue_survives_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("queue.db");
        {
            let db = Database::open(&path).unwrap();
            SqliteSyncQueueRepository::new(db.connection())
                .add_sync_rows("u1", &[attempt("a1", "x")])
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let queue = SqliteSyncQueueRepository::new(db.connection())
            .read_sync_queue("u1")
            .unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_corrupt_rows_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        repo.add_sync_rows("u1", &[attempt("a1", "x")]).unwrap();
        db.connection()
            .execute(
                "INSERT INTO sync_queue (user_key, sync_key, row_json, queued_at) VALUES (?, ?, ?, ?)",
                params!["u1", "attempt:bad", "not json", 0],
            )
            .unwrap();

        assert_eq!(repo.read_sync_queue("u1").unwrap().len(), 1);
    }
}
