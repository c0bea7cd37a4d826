//! Data models for Climbing Notes

mod attempt;
mod gym;
mod route;
mod store;
mod sync_conflict;
mod sync_row;

pub use attempt::{new_attempt_id, Attempt, ClimbStyle, CompletionStyle};
pub use gym::{gym_key, Gym};
pub use route::{is_valid_grade, normalize_grade, to_route_id, Route};
pub use store::DataStore;
pub use sync_conflict::SyncConflict;
pub use sync_row::{AttemptIndexValue, EntityKind, RecordType, SyncRow};

/// Versioned entity that can be reconciled by identity.
pub trait SyncRecord: Clone {
    /// Identity used to pair existing and incoming records
    fn merge_key(&self) -> String;

    /// Creation timestamp (Unix ms)
    fn created_at(&self) -> i64;

    /// Last update timestamp (Unix ms), absent for never-edited imports
    fn updated_at(&self) -> Option<i64>;

    /// Take over the identity field of the record being replaced
    #[must_use]
    fn adopt_identity(self, existing: &Self) -> Self;

    fn set_created_at(&mut self, created_at: i64);

    /// Timestamp compared against tombstones: `updated_at`, else `created_at`
    fn local_timestamp(&self) -> i64 {
        self.updated_at().unwrap_or_else(|| self.created_at())
    }
}
