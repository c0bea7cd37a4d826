//! Async services shared by the CLI and the sync engine

mod database;
mod editor;

pub use database::DatabaseService;
pub use editor::{AttemptDraft, ImportSummary, LocalEditor, RouteDraft};
