//! Per-user pull cursor storage

use crate::error::Result;
use crate::sync::{SyncCursor, SyncMeta};
use rusqlite::{params, Connection, OptionalExtension};

/// Trait for sync metadata storage
pub trait SyncMetaRepository {
    /// Stored metadata, or the default when the user never synced
    fn read_sync_meta(&self, user_key: &str) -> Result<SyncMeta>;

    fn write_sync_meta(&self, user_key: &str, meta: &SyncMeta) -> Result<()>;
}

/// `SQLite` implementation of `SyncMetaRepository`
pub struct SqliteSyncMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncMetaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SyncMetaRepository for SqliteSyncMetaRepository<'_> {
    fn read_sync_meta(&self, user_key: &str) -> Result<SyncMeta> {
        let stored = self
            .conn
            .query_row(
                "SELECT last_sync_at_ms, last_sync_key, last_synced_at FROM sync_meta WHERE user_key = ?",
                params![user_key],
                |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((last_sync_at_ms, last_sync_key, last_synced_at)) = stored else {
            return Ok(SyncMeta::default());
        };
        let cursor = last_sync_at_ms.map(|ms| SyncCursor::new(ms, last_sync_key.unwrap_or_default()));
        Ok(SyncMeta {
            cursor,
            last_synced_at,
        })
    }

    fn write_sync_meta(&self, user_key: &str, meta: &SyncMeta) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_meta (user_key, last_sync_at_ms, last_sync_key, last_synced_at)
             VALUES (?, ?, ?, ?)",
            params![
                user_key,
                meta.cursor.as_ref().map(|cursor| cursor.last_sync_at_ms),
                meta.cursor.as_ref().map(|cursor| cursor.last_sync_key.as_str()),
                meta.last_synced_at
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_meta_is_default() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncMetaRepository::new(db.connection());
        assert_eq!(repo.read_sync_meta("u1").unwrap(), SyncMeta::default());
    }

    #[test]
    fn test_write_and_read_cursor() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncMetaRepository::new(db.connection());
        let meta = SyncMeta {
            cursor: Some(SyncCursor::new(1_700_000_000_123, "route:R1")),
            last_synced_at: Some(1_700_000_000_500),
        };
        repo.write_sync_meta("u1", &meta).unwrap();

        assert_eq!(repo.read_sync_meta("u1").unwrap(), meta);
        assert_eq!(repo.read_sync_meta("u2").unwrap(), SyncMeta::default());
    }
}
