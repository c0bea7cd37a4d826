//! Record store repository implementation

use crate::error::Result;
use crate::models::DataStore;
use rusqlite::{params, Connection, OptionalExtension};

const DATA_KEY: &str = "climbnotes_data";

/// Trait for loading and saving the local record store
pub trait DataRepository {
    /// Load the store; an unreadable blob yields an empty store
    fn load(&self) -> Result<DataStore>;

    /// Replace the stored snapshot
    fn save(&self, data: &DataStore) -> Result<()>;
}

/// `SQLite` implementation of `DataRepository`
pub struct SqliteDataRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteDataRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl DataRepository for SqliteDataRepository<'_> {
    fn load(&self) -> Result<DataStore> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM app_data WHERE key = ?",
                params![DATA_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(DataStore::empty());
        };
        match serde_json::from_str::<DataStore>(&raw) {
            Ok(data) => Ok(data),
            Err(error) => {
                tracing::warn!("Stored data is unreadable, starting from an empty store: {error}");
                Ok(DataStore::empty())
            }
        }
    }

    fn save(&self, data: &DataStore) -> Result<()> {
        let value = serde_json::to_string(data)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO app_data (key, value) VALUES (?, ?)",
            params![DATA_KEY, value],
        )?;
        Ok(())
    }
}
