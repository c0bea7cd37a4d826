use climbnotes_core::services::{AttemptDraft, RouteDraft};

use crate::cli::AddCommands;
use crate::commands::common::{require_argument, today, CliContext};
use crate::error::CliError;

pub async fn run_add(record: AddCommands, context: &CliContext) -> Result<(), CliError> {
    let editor = context.open_editor().await?;

    match record {
        AddCommands::Gym { name } => {
            let gym = editor.upsert_gym(&require_argument(&name, "Gym name")?).await?;
            println!("{}", gym.name);
        }
        AddCommands::Route {
            gym,
            rope,
            color,
            set_date,
            grade,
        } => {
            let route = editor
                .upsert_route(RouteDraft {
                    gym_name: gym,
                    rope_number: rope,
                    color,
                    set_date,
                    grade,
                })
                .await?;
            println!("{}", route.route_id);
        }
        AddCommands::Attempt {
            route_id,
            date,
            style,
            completion,
            notes,
        } => {
            let attempt = editor
                .record_attempt(AttemptDraft {
                    route_id: require_argument(&route_id, "Route ID")?,
                    climb_date: date.unwrap_or_else(today),
                    climb_style: style.into(),
                    completion_style: completion.into(),
                    notes,
                })
                .await?;
            println!("{} #{}", attempt.attempt_id, attempt.attempt_index);
        }
    }

    Ok(())
}
