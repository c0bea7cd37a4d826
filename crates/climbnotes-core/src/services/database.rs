//! Shared database service wrapper used by the editor, the sync engine and the CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::db::{
    ConflictRepository, DataRepository, Database, SqliteConflictRepository,
    SqliteDataRepository, SqliteSyncMetaRepository, SqliteSyncQueueRepository,
    SqliteTombstoneRepository, SyncMetaRepository, SyncQueueRepository, TombstoneRepository,
};
use crate::models::{DataStore, SyncConflict, SyncRow};
use crate::sync::SyncMeta;
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh one is
    /// created in its place.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path) {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Local database at {} is unreadable: {}. Starting a fresh one.",
                    db_path.display(),
                    error
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path)?
            }
            Err(error) => return Err(error),
        };
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, if any
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run `operation` inside one transaction while holding the database lock.
    ///
    /// Nothing is written when `operation` fails.
    pub async fn transaction<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let value = operation(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Load the record store.
    pub async fn load_data(&self) -> Result<DataStore> {
        let db = self.db.lock().await;
        SqliteDataRepository::new(db.connection()).load()
    }

    /// Replace the record store.
    pub async fn save_data(&self, data: &DataStore) -> Result<()> {
        let db = self.db.lock().await;
        SqliteDataRepository::new(db.connection()).save(data)
    }

    /// Queue rows for push.
    pub async fn add_sync_rows(&self, user_key: &str, rows: &[SyncRow]) -> Result<Vec<SyncRow>> {
        self.transaction(|conn| SqliteSyncQueueRepository::new(conn).add_sync_rows(user_key, rows))
            .await
    }

    /// Drop queued rows by sync key.
    pub async fn remove_sync_rows(
        &self,
        user_key: &str,
        sync_keys: &[String],
    ) -> Result<Vec<SyncRow>> {
        self.transaction(|conn| {
            SqliteSyncQueueRepository::new(conn).remove_sync_rows(user_key, sync_keys)
        })
        .await
    }

    /// Pending outbox rows.
    pub async fn read_sync_queue(&self, user_key: &str) -> Result<Vec<SyncRow>> {
        let db = self.db.lock().await;
        SqliteSyncQueueRepository::new(db.connection()).read_sync_queue(user_key)
    }

    /// Empty the outbox.
    pub async fn clear_sync_queue(&self, user_key: &str) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteSyncQueueRepository::new(db.connection()).clear_sync_queue(user_key)
    }

    /// Pending delete markers.
    pub async fn read_tombstones(&self, user_key: &str) -> Result<Vec<SyncRow>> {
        let db = self.db.lock().await;
        SqliteTombstoneRepository::new(db.connection()).read_tombstones(user_key)
    }

    /// Forget every pending delete marker.
    pub async fn clear_tombstones(&self, user_key: &str) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteTombstoneRepository::new(db.connection()).clear_tombstones(user_key)
    }

    /// Stored pull cursor and last sync time.
    pub async fn read_sync_meta(&self, user_key: &str) -> Result<SyncMeta> {
        let db = self.db.lock().await;
        SqliteSyncMetaRepository::new(db.connection()).read_sync_meta(user_key)
    }

    /// List recent push conflicts.
    pub async fn list_conflicts(&self, user_key: &str, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        SqliteConflictRepository::new(db.connection()).list_conflicts(user_key, limit)
    }

    /// Forget recorded push conflicts.
    pub async fn clear_conflicts(&self, user_key: &str) -> Result<usize> {
        let db = self.db.lock().await;
        SqliteConflictRepository::new(db.connection()).clear_conflicts(user_key)
    }

    fn is_corrupted_db_error(error: &crate::Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let timestamp = chrono::Utc::now().timestamp_millis();
            let base_name = db_path
                .file_name()
                .map_or_else(|| "climbnotes.db".into(), |name| name.to_string_lossy());
            let backup_path = db_path.with_file_name(format!("{base_name}.corrupt-{timestamp}"));

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted local DB file from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        for suffix in ["-wal", "-shm"] {
            let mut sidecar = db_path.as_os_str().to_owned();
            sidecar.push(suffix);
            let sidecar = PathBuf::from(sidecar);
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
                tracing::warn!("Removed stale database file {}", sidecar.display());
            }
        }

        Ok(())
    }
}
