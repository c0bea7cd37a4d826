use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use climbnotes_core::models::{ClimbStyle, CompletionStyle};

#[derive(Parser)]
#[command(name = "climbnotes")]
#[command(about = "Track climbing gyms, routes and attempts, and sync them across devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name holding user key and remote configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add or update a gym, route or attempt
    #[command(alias = "new")]
    Add {
        #[command(subcommand)]
        record: AddCommands,
    },
    /// Delete a gym, route or attempt (cascades to dependents)
    Delete {
        #[command(subcommand)]
        record: DeleteCommands,
    },
    /// List local records
    List {
        /// Which records to list
        #[arg(value_enum, default_value_t = ListKind::Routes)]
        kind: ListKind,
        /// Only records belonging to this gym
        #[arg(long, value_name = "NAME")]
        gym: Option<String>,
        /// Only attempts on this route
        #[arg(long, value_name = "ROUTE_ID")]
        route: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Merge sync rows from a JSON file (`-` reads stdin)
    Import {
        /// Path to a JSON array of rows
        path: PathBuf,
    },
    /// Export every local record as sync rows
    Export {
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Push local changes and pull remote changes
    Sync {
        /// Remote file overriding the profile's remote path
        #[arg(long, value_name = "PATH")]
        remote: Option<PathBuf>,
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
    /// Show or clear rows waiting to be pushed
    Queue {
        /// Drop every queued row and pending delete
        #[arg(long)]
        clear: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum AddCommands {
    /// Add a gym
    Gym {
        /// Gym name
        name: String,
    },
    /// Add a route, or regrade an existing one
    Route {
        /// Gym the route is set at (created when missing)
        #[arg(long)]
        gym: String,
        /// Rope or wall number
        #[arg(long)]
        rope: String,
        /// Hold color
        #[arg(long)]
        color: String,
        /// Date the route was set (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        set_date: String,
        /// YDS grade, e.g. 5.10a or 11b
        #[arg(long)]
        grade: String,
    },
    /// Log an attempt on a route
    Attempt {
        /// Route id as printed by `route add`
        route_id: String,
        /// Day of the attempt (defaults to today)
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
        #[arg(long, value_enum, default_value_t = StyleArg::TopRope)]
        style: StyleArg,
        #[arg(long, value_enum, default_value_t = CompletionArg::Attempt)]
        completion: CompletionArg,
        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
    },
}

#[derive(Subcommand)]
pub enum DeleteCommands {
    /// Delete a gym with its routes and attempts
    Gym { name: String },
    /// Delete a route with its attempts
    Route { route_id: String },
    /// Delete a single attempt
    Attempt { attempt_id: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ListKind {
    Gyms,
    Routes,
    Attempts,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum StyleArg {
    TopRope,
    Lead,
}

impl From<StyleArg> for ClimbStyle {
    fn from(value: StyleArg) -> Self {
        match value {
            StyleArg::TopRope => Self::TopRope,
            StyleArg::Lead => Self::Lead,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionArg {
    SendClean,
    SendRested,
    Attempt,
}

impl From<CompletionArg> for CompletionStyle {
    fn from(value: CompletionArg) -> Self {
        match value {
            CompletionArg::SendClean => Self::SendClean,
            CompletionArg::SendRested => Self::SendRested,
            CompletionArg::Attempt => Self::Attempt,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List rows the remote refused as stale
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show cursor, last sync time and pending counts
    Status,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Key identifying the user's queue and cursor
        #[arg(long, value_name = "KEY")]
        user_key: Option<String>,
        /// Shared remote file used by `climbnotes sync`
        #[arg(long, value_name = "PATH")]
        remote_path: Option<PathBuf>,
        /// Local database file for this profile
        #[arg(long, value_name = "PATH")]
        data_path: Option<PathBuf>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}
