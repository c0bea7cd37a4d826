//! Remote store collaborator

use serde::{Deserialize, Serialize};

use crate::models::SyncRow;

use super::{SyncCursor, TransportError};

/// Rows at or after the requested cursor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub rows: Vec<SyncRow>,
    /// Server clock when the pull was answered (ISO-8601)
    pub server_time: String,
}

/// Row the remote refused because its own copy was newer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushConflict {
    pub sync_key: String,
    pub record_type: String,
}

/// Outcome of pushing one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub applied: usize,
    pub skipped: usize,
    pub conflicts: Vec<PushConflict>,
    pub server_time: String,
}

/// Remote store holding one user's rows.
///
/// Implementations apply the same newest-wins rules server side. A failed
/// call must not have partially applied a push.
#[allow(async_fn_in_trait)]
pub trait SyncRemote {
    /// Rows with a server timestamp at or after `cursor`, or every row
    /// when no cursor is given.
    async fn pull(&self, cursor: Option<&SyncCursor>) -> Result<PullResponse, TransportError>;

    /// Offer local rows to the remote.
    async fn push(&self, rows: &[SyncRow]) -> Result<PushResponse, TransportError>;
}

impl<R: SyncRemote> SyncRemote for &R {
    async fn pull(&self, cursor: Option<&SyncCursor>) -> Result<PullResponse, TransportError> {
        (**self).pull(cursor).await
    }

    async fn push(&self, rows: &[SyncRow]) -> Result<PushResponse, TransportError> {
        (**self).push(rows).await
    }
}
