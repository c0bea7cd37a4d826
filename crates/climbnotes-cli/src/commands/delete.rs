use climbnotes_core::sync::TombstoneOutcome;

use crate::cli::DeleteCommands;
use crate::commands::common::{require_argument, CliContext};
use crate::error::CliError;

pub async fn run_delete(record: DeleteCommands, context: &CliContext) -> Result<(), CliError> {
    let editor = context.open_editor().await?;
    let outcome = match record {
        DeleteCommands::Gym { name } => {
            editor
                .delete_gym(&require_argument(&name, "Gym name")?)
                .await?
        }
        DeleteCommands::Route { route_id } => {
            editor
                .delete_route(&require_argument(&route_id, "Route ID")?)
                .await?
        }
        DeleteCommands::Attempt { attempt_id } => {
            editor
                .delete_attempt(&require_argument(&attempt_id, "Attempt ID")?)
                .await?
        }
    };

    println!("{}", describe_removal(&outcome));
    Ok(())
}

pub fn describe_removal(outcome: &TombstoneOutcome) -> String {
    format!(
        "Removed {} gyms, {} routes, {} attempts",
        outcome.removed_gyms, outcome.removed_routes, outcome.removed_attempts
    )
}
