//! Per-user keyed row tables shared by the sync queue and the tombstone log

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::SyncRow;

/// Table holding at most one pending row per `(user_key, sync_key)`.
///
/// Rows keep the position of their first insertion when replaced.
#[derive(Debug, Clone, Copy)]
pub(super) struct KeyedRowTable {
    name: &'static str,
}

pub(super) const SYNC_QUEUE: KeyedRowTable = KeyedRowTable { name: "sync_queue" };
pub(super) const TOMBSTONES: KeyedRowTable = KeyedRowTable { name: "tombstones" };

impl KeyedRowTable {
    /// Insert or replace rows keyed by sync key.
    ///
    /// Callers wanting all-or-nothing writes run this inside a transaction.
    pub fn upsert(
        self,
        conn: &Connection,
        user_key: &str,
        rows: &[(String, SyncRow)],
        queued_at: i64,
    ) -> Result<()> {
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {} (user_key, sync_key, row_json, queued_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(user_key, sync_key)
             DO UPDATE SET row_json = excluded.row_json, queued_at = excluded.queued_at",
            self.name
        ))?;
        for (sync_key, row) in rows {
            let row_json = serde_json::to_string(row)?;
            stmt.execute(params![user_key, sync_key, row_json, queued_at])?;
        }
        Ok(())
    }

    /// Rows in insertion order, with their sync keys.
    ///
    /// Rows whose JSON no longer parses are logged and dropped.
    pub fn read(self, conn: &Connection, user_key: &str) -> Result<Vec<(String, SyncRow)>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT sync_key, row_json FROM {} WHERE user_key = ? ORDER BY seq ASC",
            self.name
        ))?;
        let stored = stmt
            .query_map(params![user_key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(stored.len());
        for (sync_key, row_json) in stored {
            match serde_json::from_str::<SyncRow>(&row_json) {
                Ok(row) => rows.push((sync_key, row)),
                Err(error) => {
                    tracing::warn!("Dropping unreadable {} row {sync_key}: {error}", self.name);
                }
            }
        }
        Ok(rows)
    }

    pub fn remove(self, conn: &Connection, user_key: &str, sync_keys: &[String]) -> Result<usize> {
        if sync_keys.is_empty() {
            return Ok(0);
        }
        let mut stmt = conn.prepare(&format!(
            "DELETE FROM {} WHERE user_key = ? AND sync_key = ?",
            self.name
        ))?;
        let mut removed = 0;
        for sync_key in sync_keys {
            removed += stmt.execute(params![user_key, sync_key])?;
        }
        Ok(removed)
    }

    pub fn clear(self, conn: &Connection, user_key: &str) -> Result<usize> {
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE user_key = ?", self.name),
            params![user_key],
        )?;
        Ok(removed)
    }

    pub fn count(self, conn: &Connection, user_key: &str) -> Result<usize> {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE user_key = ?", self.name),
            params![user_key],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
