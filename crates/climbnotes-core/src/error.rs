//! Error types for climbnotes-core

use thiserror::Error;

use crate::sync::TransportError;

/// Result type alias using climbnotes-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in climbnotes-core operations
///
/// Skipped rows, orphaned attempts and push conflicts are ordinary outcomes
/// and are reported through counters, never through this type.
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote pull/push failed; local state was left untouched
    #[error("Sync transport error: {0}")]
    Transport(#[from] TransportError),
}

impl Error {
    /// Whether the failed operation can be retried as-is.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(error) => error.is_retryable(),
            _ => false,
        }
    }
}
