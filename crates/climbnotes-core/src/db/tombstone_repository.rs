//! Local log of pending delete markers

use crate::error::Result;
use crate::models::{EntityKind, SyncRow};
use crate::normalize::normalize_row;
use crate::util::now_ms;
use rusqlite::Connection;

use super::outbox::TOMBSTONES;

/// Trait for the per-user tombstone log, deduplicated by sync key
pub trait TombstoneRepository {
    /// Record delete markers and return the whole log afterwards
    fn add_tombstones(&self, user_key: &str, rows: &[SyncRow]) -> Result<Vec<SyncRow>>;

    fn read_tombstones(&self, user_key: &str) -> Result<Vec<SyncRow>>;

    /// Pending markers with their keys
    fn read_keyed(&self, user_key: &str) -> Result<Vec<(String, SyncRow)>>;

    /// Drop markers the remote acknowledged
    fn remove_tombstones(&self, user_key: &str, sync_keys: &[String]) -> Result<Vec<SyncRow>>;

    fn clear_tombstones(&self, user_key: &str) -> Result<usize>;
}

/// `SQLite` implementation of `TombstoneRepository`
pub struct SqliteTombstoneRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTombstoneRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

/// Reduce a tombstone row to its type, identity and timestamp.
pub fn tombstone_entry(row: &SyncRow) -> Option<(String, SyncRow)> {
    let normalized = normalize_row(row)?;
    let record_type = normalized.parsed_type()?;
    if !record_type.is_tombstone() {
        return None;
    }
    let key = normalized.identity_key()?;
    let identity = normalized.identity(record_type.entity()).map(str::to_string);
    let mut marker = SyncRow {
        updated_at: normalized.updated_at.clone(),
        updated_at_ms: normalized.updated_at_ms,
        ..SyncRow::of_type(record_type)
    };
    match record_type.entity() {
        EntityKind::Gym => marker.gym_name = identity,
        EntityKind::Route => marker.route_id = identity,
        EntityKind::Attempt => marker.attempt_id = identity,
    }
    Some((key, marker))
}

impl TombstoneRepository for SqliteTombstoneRepository<'_> {
    fn add_tombstones(&self, user_key: &str, rows: &[SyncRow]) -> Result<Vec<SyncRow>> {
        let entries: Vec<_> = rows.iter().filter_map(tombstone_entry).collect();
        TOMBSTONES.upsert(self.conn, user_key, &entries, now_ms())?;
        self.read_tombstones(user_key)
    }

    fn read_tombstones(&self, user_key: &str) -> Result<Vec<SyncRow>> {
        Ok(self
            .read_keyed(user_key)?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    fn read_keyed(&self, user_key: &str) -> Result<Vec<(String, SyncRow)>> {
        TOMBSTONES.read(self.conn, user_key)
    }

    fn remove_tombstones(&self, user_key: &str, sync_keys: &[String]) -> Result<Vec<SyncRow>> {
        TOMBSTONES.remove(self.conn, user_key, sync_keys)?;
        self.read_tombstones(user_key)
    }

    fn clear_tombstones(&self, user_key: &str) -> Result<usize> {
        TOMBSTONES.clear(self.conn, user_key)
    }
}
