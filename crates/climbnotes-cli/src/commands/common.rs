use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use climbnotes_core::models::{Attempt, DataStore, Gym, Route, SyncConflict};
use climbnotes_core::services::{DatabaseService, LocalEditor};
use serde::Serialize;

use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

/// Where this invocation reads and writes, resolved from flags, environment
/// and the selected profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliContext {
    pub db_path: PathBuf,
    pub user_key: String,
    pub remote_path: Option<PathBuf>,
}

impl CliContext {
    pub fn resolve(db_path: Option<PathBuf>, profile: Option<&str>) -> Result<Self, CliError> {
        let config = CliProfilesConfig::load()?;
        Ok(Self::from_config(&config, db_path, profile))
    }

    pub fn from_config(
        config: &CliProfilesConfig,
        db_path: Option<PathBuf>,
        profile: Option<&str>,
    ) -> Self {
        let profile_name = config.resolve_profile_name(profile);
        let profile = config.profile(&profile_name).cloned().unwrap_or_default();

        let db_path = db_path
            .or_else(|| env::var_os("CLIMBNOTES_DB_PATH").map(PathBuf::from))
            .or_else(|| profile.data_path())
            .unwrap_or_else(default_db_path);
        let remote_path = normalize_text_option(env::var("CLIMBNOTES_REMOTE_PATH").ok())
            .map(PathBuf::from)
            .or_else(|| profile.remote_path());

        Self {
            db_path,
            user_key: profile.user_key(),
            remote_path,
        }
    }

    pub async fn open_database(&self) -> Result<DatabaseService, CliError> {
        open_database(&self.db_path).await
    }

    pub async fn open_editor(&self) -> Result<LocalEditor, CliError> {
        Ok(LocalEditor::new(
            self.open_database().await?,
            self.user_key.clone(),
        ))
    }
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("climbnotes")
        .join("climbnotes.db")
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}

pub fn require_argument(value: &str, name: &'static str) -> Result<String, CliError> {
    normalize_text_option(Some(value.to_string())).ok_or(CliError::EmptyArgument(name))
}

#[derive(Debug, Serialize)]
pub struct GymListItem {
    pub name: String,
    pub routes: usize,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub relative_time: String,
}

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub id: i64,
    pub sync_key: String,
    pub record_type: String,
    pub detected_at: i64,
    pub detected_at_iso: String,
}

pub fn gym_to_list_item(gym: &Gym, data: &DataStore) -> GymListItem {
    let now_ms = Utc::now().timestamp_millis();
    GymListItem {
        name: gym.name.clone(),
        routes: data.routes_for_gym(&gym.name).count(),
        created_at: gym.created_at,
        updated_at: gym.updated_at,
        relative_time: format_relative_time(gym.updated_at.unwrap_or(gym.created_at), now_ms),
    }
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        sync_key: conflict.sync_key.clone(),
        record_type: conflict.record_type.clone(),
        detected_at: conflict.detected_at,
        detected_at_iso: format_sync_timestamp(conflict.detected_at),
    }
}

pub fn format_gym_lines(items: &[GymListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{:<24}  {:>3} routes  {}",
                item.name, item.routes, item.relative_time
            )
        })
        .collect()
}

pub fn format_route_lines(routes: &[&Route]) -> Vec<String> {
    routes
        .iter()
        .map(|route| format!("{:<6}  {}", route.grade, route.route_id))
        .collect()
}

pub fn format_attempt_lines(attempts: &[&Attempt]) -> Vec<String> {
    attempts
        .iter()
        .map(|attempt| {
            let line = format!(
                "{}  #{:<2}  {:<8}  {:<11}  {}",
                attempt.climb_date,
                attempt.attempt_index,
                attempt.climb_style.as_str(),
                attempt.completion_style.as_str(),
                attempt.route_id
            );
            if attempt.notes.is_empty() {
                line
            } else {
                format!("{line}  \"{}\"", note_preview(&attempt.notes, 40))
            }
        })
        .collect()
}

pub fn note_preview(notes: &str, max_chars: usize) -> String {
    let first_line = notes.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<17}  key={}",
                format_sync_timestamp(conflict.detected_at),
                conflict.record_type,
                conflict.sync_key
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Today's date in local time, the default day for a new attempt
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}
