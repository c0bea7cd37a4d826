use std::collections::BTreeMap;
use std::path::PathBuf;

use climbnotes_core::models::{RecordType, SyncConflict, SyncRow};
use climbnotes_core::sync::SyncReport;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::cli::{AddCommands, CompletionArg, CompletionShell, DeleteCommands, StyleArg};
use crate::commands::add::run_add;
use crate::commands::common::{
    format_relative_time, format_sync_conflict_lines, format_sync_timestamp, note_preview,
    require_argument, CliContext,
};
use crate::commands::completions::run_completions;
use crate::commands::config::{apply_config_init, ProfileUpdate};
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::import::{parse_import_rows, run_import};
use crate::commands::list::{filter_attempts, filter_routes};
use crate::commands::queue::run_queue;
use crate::commands::sync::{format_sync_report, load_sync_status, run_sync};
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

fn context_in(dir: &TempDir, name: &str) -> CliContext {
    CliContext {
        db_path: dir.path().join(format!("{name}.db")),
        user_key: "climber".to_string(),
        remote_path: Some(dir.path().join("remote.json")),
    }
}

fn add_route(gym: &str, rope: &str, grade: &str) -> AddCommands {
    AddCommands::Route {
        gym: gym.to_string(),
        rope: rope.to_string(),
        color: "Yellow".to_string(),
        set_date: "2024-07-01".to_string(),
        grade: grade.to_string(),
    }
}

fn add_attempt(route_id: &str) -> AddCommands {
    AddCommands::Attempt {
        route_id: route_id.to_string(),
        date: Some("2024-07-04".to_string()),
        style: StyleArg::Lead,
        completion: CompletionArg::SendRested,
        notes: "rested at the third bolt".to_string(),
    }
}

const BASE_ROUTE: &str = "Base:1:Yellow:2024-07-01";

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn note_preview_truncates_with_ellipsis() {
    let preview = note_preview("Pumped out on the roof, try the left heel hook", 20);
    assert_eq!(preview, "Pumped out on the...");
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_sync_conflict_lines_include_key_fields() {
    let conflicts = vec![SyncConflict {
        id: 1,
        sync_key: "route:Base:1:Yellow:2024-07-01".to_string(),
        record_type: "route".to_string(),
        detected_at: 0,
    }];

    let rendered = format_sync_conflict_lines(&conflicts);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].starts_with("1970-01-01 00:00:00 UTC"));
    assert!(rendered[0].contains("key=route:Base:1:Yellow:2024-07-01"));
}

#[test]
fn require_argument_trims_and_rejects_blank() {
    assert_eq!(require_argument("  Base ", "Gym name").unwrap(), "Base");
    assert!(matches!(
        require_argument("   ", "Gym name"),
        Err(CliError::EmptyArgument("Gym name"))
    ));
}

#[test]
fn import_rows_must_be_an_array() {
    assert!(matches!(
        parse_import_rows(r#"{"record_type": "gym"}"#),
        Err(CliError::InvalidImport(_))
    ));
    let rows = parse_import_rows(r#"[{"record_type": "gym", "gym_name": "Base"}]"#).unwrap();
    assert_eq!(rows[0].parsed_type(), Some(RecordType::Gym));
}

#[test]
fn sync_report_mentions_refused_rows() {
    let quiet = format_sync_report(&SyncReport {
        pushed: 2,
        pulled: 5,
        ..SyncReport::default()
    });
    assert!(quiet.contains("pushed 2, pulled 5"));
    assert!(!quiet.contains("refused"));

    let noisy = format_sync_report(&SyncReport {
        conflicts: 1,
        ..SyncReport::default()
    });
    assert!(noisy.contains("1 stale rows refused"));
}

#[test]
fn config_init_merges_into_profile_and_activates_it() {
    let mut config = CliProfilesConfig::default();
    let name = apply_config_init(
        &mut config,
        Some("laptop"),
        ProfileUpdate {
            user_key: Some(" me@example.com ".to_string()),
            remote_path: Some(PathBuf::from("/mnt/share/climbnotes.json")),
            data_path: None,
        },
        false,
    );
    assert_eq!(name, "laptop");
    assert_eq!(config.version, 1);
    assert_eq!(config.active_profile.as_deref(), Some("laptop"));

    apply_config_init(
        &mut config,
        Some("laptop"),
        ProfileUpdate {
            data_path: Some(PathBuf::from("/tmp/laptop.db")),
            ..ProfileUpdate::default()
        },
        true,
    );
    let profile = config.profile("laptop").unwrap();
    assert_eq!(profile.user_key(), "me@example.com");
    assert_eq!(
        profile.remote_path(),
        Some(PathBuf::from("/mnt/share/climbnotes.json"))
    );
    assert_eq!(profile.data_path(), Some(PathBuf::from("/tmp/laptop.db")));
}

#[test]
fn context_prefers_explicit_db_path_over_profile() {
    let mut profiles = BTreeMap::new();
    profiles.insert(
        "phone".to_string(),
        CliProfile {
            user_key: Some("climber".to_string()),
            remote_path: Some("/shared/remote.json".to_string()),
            data_path: Some("/profile/climbnotes.db".to_string()),
        },
    );
    let config = CliProfilesConfig {
        version: 1,
        active_profile: None,
        profiles,
    };

    let explicit = CliContext::from_config(&config, Some(PathBuf::from("/flag.db")), Some("phone"));
    assert_eq!(explicit.db_path, PathBuf::from("/flag.db"));
    assert_eq!(explicit.user_key, "climber");

    if std::env::var_os("CLIMBNOTES_DB_PATH").is_none()
        && std::env::var_os("CLIMBNOTES_REMOTE_PATH").is_none()
    {
        let from_profile = CliContext::from_config(&config, None, Some("phone"));
        assert_eq!(from_profile.db_path, PathBuf::from("/profile/climbnotes.db"));
        assert_eq!(
            from_profile.remote_path,
            Some(PathBuf::from("/shared/remote.json"))
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn added_records_are_listed_and_queued() {
    let dir = tempfile::tempdir().unwrap();
    let context = context_in(&dir, "laptop");

    run_add(add_route("Base", "1", "10a"), &context).await.unwrap();
    run_add(add_route("Mesa", "2", "5.8"), &context).await.unwrap();
    run_add(add_attempt(BASE_ROUTE), &context).await.unwrap();

    let db = context.open_database().await.unwrap();
    let data = db.load_data().await.unwrap();
    let base_routes = filter_routes(&data, Some("base"));
    assert_eq!(base_routes.len(), 1);
    assert_eq!(base_routes[0].grade, "5.10a");

    let attempts = filter_attempts(&data, None, Some(BASE_ROUTE));
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].attempt_index, 1);
    assert!(filter_attempts(&data, Some("Mesa"), None).is_empty());

    let status = load_sync_status(&context).await.unwrap();
    assert_eq!(status.queued_rows, 5);
    assert_eq!(status.pending_deletes, 0);
    assert_eq!(status.last_synced_at, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_leaves_pending_tombstone_and_queue_clear_drops_it() {
    let dir = tempfile::tempdir().unwrap();
    let context = context_in(&dir, "laptop");
    run_add(add_route("Base", "1", "5.9"), &context).await.unwrap();

    run_delete(
        DeleteCommands::Route {
            route_id: BASE_ROUTE.to_string(),
        },
        &context,
    )
    .await
    .unwrap();

    let status = load_sync_status(&context).await.unwrap();
    assert_eq!(status.queued_rows, 1);
    assert_eq!(status.pending_deletes, 1);

    run_queue(true, false, &context).await.unwrap();
    let status = load_sync_status(&context).await.unwrap();
    assert_eq!(status.queued_rows, 0);
    assert_eq!(status.pending_deletes, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn export_then_import_copies_records() {
    let dir = tempfile::tempdir().unwrap();
    let source = context_in(&dir, "source");
    run_add(add_route("Base", "1", "5.11c"), &source).await.unwrap();
    run_add(add_attempt(BASE_ROUTE), &source).await.unwrap();

    let export_path = dir.path().join("rows.json");
    run_export(Some(&export_path), &source).await.unwrap();
    let exported: Vec<SyncRow> =
        serde_json::from_str(&std::fs::read_to_string(&export_path).unwrap()).unwrap();
    assert_eq!(exported.len(), 3);

    let target = context_in(&dir, "target");
    run_import(&export_path, &target).await.unwrap();

    let source_data = source.open_database().await.unwrap().load_data().await.unwrap();
    let target_data = target.open_database().await.unwrap().load_data().await.unwrap();
    assert_eq!(target_data, source_data);
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_moves_records_between_databases_through_remote_file() {
    let dir = tempfile::tempdir().unwrap();
    let laptop = context_in(&dir, "laptop");
    let phone = context_in(&dir, "phone");

    run_add(add_route("Base", "1", "5.9"), &laptop).await.unwrap();
    run_add(add_attempt(BASE_ROUTE), &laptop).await.unwrap();
    run_sync(None, &laptop).await.unwrap();
    assert!(dir.path().join("remote.json").exists());

    run_sync(None, &phone).await.unwrap();
    let phone_data = phone.open_database().await.unwrap().load_data().await.unwrap();
    assert_eq!(phone_data.routes.len(), 1);
    assert_eq!(phone_data.attempts.len(), 1);

    let status = load_sync_status(&phone).await.unwrap();
    assert!(status.last_synced_at.is_some());
    assert!(status.cursor_ms.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_without_remote_is_not_configured() {
    let dir = tempfile::tempdir().unwrap();
    let context = CliContext {
        remote_path: None,
        ..context_in(&dir, "laptop")
    };
    assert!(matches!(
        run_sync(None, &context).await,
        Err(CliError::SyncNotConfigured)
    ));
}

#[test]
fn run_completions_writes_bash_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("climbnotes.bash");

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_climbnotes()"));
    assert!(script.contains("complete -F _climbnotes"));
}
