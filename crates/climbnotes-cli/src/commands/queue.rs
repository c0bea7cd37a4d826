use climbnotes_core::models::SyncRow;

use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_queue(clear: bool, as_json: bool, context: &CliContext) -> Result<(), CliError> {
    let db = context.open_database().await?;

    if clear {
        let rows = db.clear_sync_queue(&context.user_key).await?;
        let deletes = db.clear_tombstones(&context.user_key).await?;
        println!("Cleared {rows} queued rows and {deletes} pending deletes");
        return Ok(());
    }

    let mut pending = db.read_sync_queue(&context.user_key).await?;
    pending.extend(db.read_tombstones(&context.user_key).await?);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }
    if pending.is_empty() {
        println!("Nothing waiting to sync.");
        return Ok(());
    }
    for line in format_queue_lines(&pending) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_queue_lines(rows: &[SyncRow]) -> Vec<String> {
    rows.iter()
        .map(|row| {
            format!(
                "{:<17}  {:<24}  {}",
                row.record_type,
                row.updated_at.as_deref().unwrap_or("-"),
                row.identity_key().unwrap_or_default()
            )
        })
        .collect()
}
