//! Push conflict log

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::Result;
use crate::models::SyncConflict;
use crate::sync::PushConflict;
use rusqlite::{params, Connection};

/// Trait for recording rows the remote refused
pub trait ConflictRepository {
    fn record_conflicts(
        &self,
        user_key: &str,
        conflicts: &[PushConflict],
        detected_at: i64,
    ) -> Result<()>;

    /// Most recent conflicts first
    fn list_conflicts(&self, user_key: &str, limit: usize) -> Result<Vec<SyncConflict>>;

    fn clear_conflicts(&self, user_key: &str) -> Result<usize>;
}

/// `SQLite` implementation of `ConflictRepository`
pub struct SqliteConflictRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteConflictRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ConflictRepository for SqliteConflictRepository<'_> {
    fn record_conflicts(
        &self,
        user_key: &str,
        conflicts: &[PushConflict],
        detected_at: i64,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO sync_conflicts (user_key, sync_key, record_type, detected_at)
             VALUES (?, ?, ?, ?)",
        )?;
        for conflict in conflicts {
            stmt.execute(params![
                user_key,
                conflict.sync_key,
                conflict.record_type,
                detected_at
            ])?;
        }
        Ok(())
    }

    fn list_conflicts(&self, user_key: &str, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, sync_key, record_type, detected_at
             FROM sync_conflicts
             WHERE user_key = ?
             ORDER BY detected_at DESC, id DESC
             LIMIT ?",
        )?;
        let conflicts = stmt
            .query_map(params![user_key, limit as i64], |row| {
                Ok(SyncConflict {
                    id: row.get(0)?,
                    sync_key: row.get(1)?,
                    record_type: row.get(2)?,
                    detected_at: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(conflicts)
    }

    fn clear_conflicts(&self, user_key: &str) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM sync_conflicts WHERE user_key = ?",
            params![user_key],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn conflict(sync_key: &str) -> PushConflict {
        PushConflict {
            sync_key: sync_key.to_string(),
            record_type: "route".to_string(),
        }
    }

    #[test]
    fn test_record_and_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteConflictRepository::new(db.connection());

        repo.record_conflicts("u1", &[conflict("route:R1")], 10).unwrap();
        repo.record_conflicts("u1", &[conflict("route:R2")], 20).unwrap();
        repo.record_conflicts("u2", &[conflict("route:R3")], 30).unwrap();

        let keys: Vec<_> = repo
            .list_conflicts("u1", 10)
            .unwrap()
            .into_iter()
            .map(|conflict| conflict.sync_key)
            .collect();
        assert_eq!(keys, vec!["route:R2", "route:R1"]);
        assert_eq!(repo.list_conflicts("u1", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_clear_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteConflictRepository::new(db.connection());
        repo.record_conflicts("u1", &[conflict("route:R1")], 10).unwrap();
        assert_eq!(repo.clear_conflicts("u1").unwrap(), 1);
        assert!(repo.list_conflicts("u1", 10).unwrap().is_empty());
    }
}
