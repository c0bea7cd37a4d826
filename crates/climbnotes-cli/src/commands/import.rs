use std::io::{self, Read};
use std::path::Path;

use climbnotes_core::models::SyncRow;
use climbnotes_core::services::ImportSummary;

use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_import(path: &Path, context: &CliContext) -> Result<(), CliError> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().lock().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    let rows = parse_import_rows(&raw)?;

    let editor = context.open_editor().await?;
    let summary = editor.import_rows(rows).await?;
    for line in format_import_summary(&summary) {
        println!("{line}");
    }
    Ok(())
}

pub fn parse_import_rows(raw: &str) -> Result<Vec<SyncRow>, CliError> {
    serde_json::from_str(raw).map_err(|error| CliError::InvalidImport(error.to_string()))
}

pub fn format_import_summary(summary: &ImportSummary) -> Vec<String> {
    let merge = &summary.merge;
    let mut lines = vec![
        format!(
            "Gyms: {} added, {} updated",
            merge.added_gyms, merge.updated_gyms
        ),
        format!(
            "Routes: {} added, {} updated",
            merge.added_routes, merge.updated_routes
        ),
        format!(
            "Attempts: {} added, {} updated",
            merge.added_attempts, merge.updated_attempts
        ),
    ];
    if summary.tombstones.applied > 0 {
        lines.push(format!("Deleted: {} records", summary.tombstones.applied));
    }
    let skipped = summary.skipped_rows + merge.skipped_attempts;
    if skipped > 0 {
        lines.push(format!("Skipped: {skipped} rows"));
    }
    lines.push(format!("Queued for sync: {}", summary.queued));
    lines
}
