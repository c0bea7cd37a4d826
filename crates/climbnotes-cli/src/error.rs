use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] climbnotes_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0} cannot be empty")]
    EmptyArgument(&'static str),
    #[error("Import file must hold a JSON array of rows: {0}")]
    InvalidImport(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync remote is not configured. Run `climbnotes config init --remote-path <PATH>`, set CLIMBNOTES_REMOTE_PATH, or pass --remote."
    )]
    SyncNotConfigured,
}
