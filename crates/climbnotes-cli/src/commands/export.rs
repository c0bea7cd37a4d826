use std::path::Path;

use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_export(output_path: Option<&Path>, context: &CliContext) -> Result<(), CliError> {
    let rows = context.open_editor().await?.export_rows().await?;
    let rendered = serde_json::to_string_pretty(&rows)?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
