//! Climbing Notes CLI - record climbs offline and sync them through a shared remote

mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::run_add;
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::import::run_import;
use crate::commands::list::run_list;
use crate::commands::queue::run_queue;
use crate::commands::sync::{run_sync, run_sync_conflicts, run_sync_status};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let profile = cli.profile.as_deref();
    let db_path = cli.db_path;
    let context = || -> Result<CliContext, CliError> {
        let context = CliContext::resolve(db_path.clone(), profile)?;
        tracing::debug!(
            "Using database {} for user '{}'",
            context.db_path.display(),
            context.user_key
        );
        Ok(context)
    };

    match command {
        Commands::Add { record } => run_add(record, &context()?).await,
        Commands::Delete { record } => run_delete(record, &context()?).await,
        Commands::List {
            kind,
            gym,
            route,
            json,
        } => run_list(kind, gym.as_deref(), route.as_deref(), json, &context()?).await,
        Commands::Import { path } => run_import(&path, &context()?).await,
        Commands::Export { output } => run_export(output.as_deref(), &context()?).await,
        Commands::Sync { remote, command } => match command {
            None => run_sync(remote.as_deref(), &context()?).await,
            Some(SyncCommands::Conflicts { limit, json }) => {
                run_sync_conflicts(limit, json, &context()?).await
            }
            Some(SyncCommands::Status) => run_sync_status(&context()?).await,
        },
        Commands::Queue { clear, json } => run_queue(clear, json, &context()?).await,
        Commands::Config { command } => run_config(command, profile),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "climbnotes=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
