//! Sync conflict model

use serde::{Deserialize, Serialize};

/// Push row rejected by the remote because its copy was newer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Sync key of the rejected row
    pub sync_key: String,
    /// Record type of the rejected row
    pub record_type: String,
    /// When the push reported the conflict (Unix ms)
    pub detected_at: i64,
}
