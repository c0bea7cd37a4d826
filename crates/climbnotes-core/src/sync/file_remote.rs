//! Remote store persisted as a JSON file, shared by several local databases

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::models::SyncRow;

use super::memory_remote::RemoteState;
use super::remote::{PullResponse, PushResponse, SyncRemote};
use super::{SyncCursor, TransportError};

/// [`SyncRemote`] backed by a JSON file.
///
/// The file is read on every call and rewritten after each push, so
/// separate processes pointing at the same path see each other's rows.
#[derive(Debug)]
pub struct FileRemote {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileRemote {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<RemoteState, TransportError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RemoteState::default());
            }
            Err(error) => {
                return Err(TransportError::transient(format!(
                    "failed to read remote {}: {error}",
                    self.path.display()
                )));
            }
        };
        if raw.trim().is_empty() {
            return Ok(RemoteState::default());
        }
        serde_json::from_str(&raw).map_err(|error| {
            TransportError::rejected(format!(
                "remote file {} is not valid: {error}",
                self.path.display()
            ))
        })
    }

    fn save(&self, state: &RemoteState) -> Result<(), TransportError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let raw = serde_json::to_string_pretty(state)?;
            let staging = self.path.with_extension("json.tmp");
            std::fs::write(&staging, raw)?;
            std::fs::rename(&staging, &self.path)
        };
        write().map_err(|error| {
            TransportError::transient(format!(
                "failed to write remote {}: {error}",
                self.path.display()
            ))
        })
    }
}

impl SyncRemote for FileRemote {
    async fn pull(&self, cursor: Option<&SyncCursor>) -> Result<PullResponse, TransportError> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.pull(cursor))
    }

    async fn push(&self, rows: &[SyncRow]) -> Result<PushResponse, TransportError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load()?;
        let response = state.push(rows);
        if response.applied > 0 {
            self.save(&state)?;
        }
        Ok(response)
    }
}
