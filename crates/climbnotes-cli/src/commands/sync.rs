use std::path::Path;

use climbnotes_core::sync::{FileRemote, SyncEngine, SyncOptions, SyncReport};
use serde::Serialize;

use crate::commands::common::{
    format_sync_conflict_lines, format_sync_timestamp, sync_conflict_to_item, CliContext,
    SyncConflictItem,
};
use crate::error::CliError;

pub async fn run_sync(remote: Option<&Path>, context: &CliContext) -> Result<(), CliError> {
    let remote_path = remote
        .map(Path::to_path_buf)
        .or_else(|| context.remote_path.clone())
        .ok_or(CliError::SyncNotConfigured)?;

    let engine = SyncEngine::new(
        context.open_database().await?,
        FileRemote::new(remote_path),
        SyncOptions::new(context.user_key.clone()),
    );
    let report = engine.sync().await?;
    println!("{}", format_sync_report(&report));
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut line = format!(
        "Sync completed: pushed {}, pulled {}, applied {} records and {} deletes",
        report.pushed, report.pulled, report.applied_records, report.applied_tombstones
    );
    if report.conflicts > 0 {
        line.push_str(&format!(
            " ({} stale rows refused, see `climbnotes sync conflicts`)",
            report.conflicts
        ));
    }
    line
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    context: &CliContext,
) -> Result<(), CliError> {
    let db = context.open_database().await?;
    let conflicts = db.list_conflicts(&context.user_key, limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(sync_conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_sync_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub user_key: String,
    pub last_synced_at: Option<String>,
    pub cursor_ms: Option<i64>,
    pub cursor_key: Option<String>,
    pub queued_rows: usize,
    pub pending_deletes: usize,
}

pub async fn load_sync_status(context: &CliContext) -> Result<SyncStatus, CliError> {
    let db = context.open_database().await?;
    let meta = db.read_sync_meta(&context.user_key).await?;
    Ok(SyncStatus {
        user_key: context.user_key.clone(),
        last_synced_at: meta.last_synced_at.map(format_sync_timestamp),
        cursor_ms: meta.cursor.as_ref().map(|cursor| cursor.last_sync_at_ms),
        cursor_key: meta.cursor.map(|cursor| cursor.last_sync_key),
        queued_rows: db.read_sync_queue(&context.user_key).await?.len(),
        pending_deletes: db.read_tombstones(&context.user_key).await?.len(),
    })
}

pub async fn run_sync_status(context: &CliContext) -> Result<(), CliError> {
    let status = load_sync_status(context).await?;
    println!("User: {}", status.user_key);
    println!(
        "Last sync: {}",
        status.last_synced_at.as_deref().unwrap_or("never")
    );
    if let (Some(ms), Some(key)) = (status.cursor_ms, status.cursor_key.as_deref()) {
        println!("Cursor: {ms} {key}");
    }
    println!(
        "Pending: {} rows, {} deletes",
        status.queued_rows, status.pending_deletes
    );
    Ok(())
}
