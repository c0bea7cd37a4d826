//! Database layer for Climbing Notes

mod conflict_repository;
mod connection;
mod data_repository;
mod migrations;
mod outbox;
mod sync_meta_repository;
mod sync_queue_repository;
mod tombstone_repository;

pub use conflict_repository::{ConflictRepository, SqliteConflictRepository};
pub use connection::Database;
pub use data_repository::{DataRepository, SqliteDataRepository};
pub use sync_meta_repository::{SqliteSyncMetaRepository, SyncMetaRepository};
pub use sync_queue_repository::{queue_entry, SqliteSyncQueueRepository, SyncQueueRepository};
pub use tombstone_repository::{tombstone_entry, SqliteTombstoneRepository, TombstoneRepository};
