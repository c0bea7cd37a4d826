//! Local record entry: every edit is saved, queued for push, and deletes
//! leave a tombstone behind.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;

use crate::db::{
    DataRepository, SqliteDataRepository, SqliteSyncQueueRepository, SqliteTombstoneRepository,
    SyncQueueRepository, TombstoneRepository,
};
use crate::models::{
    is_valid_grade, normalize_grade, to_route_id, Attempt, ClimbStyle, CompletionStyle,
    DataStore, EntityKind, Gym, Route, SyncRecord, SyncRow,
};
use crate::normalize::{Tombstone, TombstoneTarget};
use crate::sync::{
    apply_sync_rows, apply_tombstones, build_attempt_sync_row, build_gym_sync_row,
    build_route_sync_row, build_sync_rows_from_data, build_tombstone_row, MergeSummary,
    TombstoneOutcome,
};
use crate::util::{normalize_text_ref, now_ms};
use crate::{Error, Result};

use super::DatabaseService;

/// Fields a user enters for a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDraft {
    pub gym_name: String,
    pub rope_number: String,
    pub color: String,
    pub set_date: String,
    pub grade: String,
}

/// Fields a user enters for an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptDraft {
    pub route_id: String,
    pub climb_date: String,
    pub climb_style: ClimbStyle,
    pub completion_style: CompletionStyle,
    pub notes: String,
}

/// Result of importing a batch of rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub merge: MergeSummary,
    pub tombstones: TombstoneOutcome,
    pub skipped_rows: usize,
    /// Rows queued for push because the import changed them
    pub queued: usize,
}

/// Applies local edits for one user.
#[derive(Clone)]
pub struct LocalEditor {
    service: DatabaseService,
    user_key: String,
}

struct EditOutcome<T> {
    value: T,
    tombstones: Vec<SyncRow>,
}

impl<T> EditOutcome<T> {
    const fn plain(value: T) -> Self {
        Self {
            value,
            tombstones: Vec::new(),
        }
    }
}

impl LocalEditor {
    pub fn new(service: DatabaseService, user_key: impl Into<String>) -> Self {
        Self {
            service,
            user_key: user_key.into(),
        }
    }

    pub fn user_key(&self) -> &str {
        &self.user_key
    }

    /// Create a gym, or touch an existing one with the same name.
    pub async fn upsert_gym(&self, name: &str) -> Result<Gym> {
        let name = required(Some(name), "gym name")?;
        self.edit(move |data, now| Ok(EditOutcome::plain(touch_gym(data, &name, now))))
            .await
    }

    /// Create or regrade a route; its gym is created when missing.
    pub async fn upsert_route(&self, draft: RouteDraft) -> Result<Route> {
        let gym_name = required(Some(&draft.gym_name), "gym name")?;
        let rope_number = required(Some(&draft.rope_number), "rope number")?;
        let color = required(Some(&draft.color), "color")?;
        let set_date = required(Some(&draft.set_date), "set date")?;
        let grade = normalize_grade(&draft.grade);
        if !is_valid_grade(&grade) {
            return Err(Error::InvalidInput(format!("invalid grade: {}", draft.grade)));
        }

        self.edit(move |data, now| {
            let existing = data.find_gym(&gym_name).map(|gym| gym.name.clone());
            let gym = existing.unwrap_or_else(|| touch_gym(data, &gym_name, now).name);
            let route_id = to_route_id(&gym, &rope_number, &color, &set_date);
            if let Some(route) = data
                .routes
                .iter_mut()
                .find(|route| route.route_id == route_id)
            {
                route.grade = grade;
                route.updated_at = Some(now);
                return Ok(EditOutcome::plain(route.clone()));
            }
            let route = Route {
                route_id,
                gym_name: gym,
                rope_number,
                color,
                set_date,
                grade,
                created_at: now,
                updated_at: Some(now),
            };
            data.routes.push(route.clone());
            Ok(EditOutcome::plain(route))
        })
        .await
    }

    /// Log an attempt as the next one for its route on that day.
    pub async fn record_attempt(&self, draft: AttemptDraft) -> Result<Attempt> {
        let route_id = required(Some(&draft.route_id), "route id")?;
        let climb_date = required(Some(&draft.climb_date), "climb date")?;

        self.edit(move |data, now| {
            if data.find_route(&route_id).is_none() {
                return Err(Error::NotFound(format!("route {route_id}")));
            }
            let attempt = Attempt {
                attempt_index: data.next_attempt_index(&route_id, &climb_date),
                climb_style: draft.climb_style,
                completion_style: draft.completion_style,
                notes: draft.notes.trim().to_string(),
                created_at: now,
                updated_at: Some(now),
                ..Attempt::new(route_id, climb_date, 0)
            };
            data.attempts.push(attempt.clone());
            Ok(EditOutcome::plain(attempt))
        })
        .await
    }

    /// Delete a gym with its routes and attempts.
    pub async fn delete_gym(&self, name: &str) -> Result<TombstoneOutcome> {
        let name = required(Some(name), "gym name")?;
        self.edit(move |data, now| {
            let gym = data
                .find_gym(&name)
                .ok_or_else(|| Error::NotFound(format!("gym {name}")))?;
            let target = TombstoneTarget::Gym(gym.name.clone());
            let deleted_at = now.max(gym.local_timestamp());
            Ok(delete(data, target, deleted_at))
        })
        .await
    }

    /// Delete a route with its attempts.
    pub async fn delete_route(&self, route_id: &str) -> Result<TombstoneOutcome> {
        let route_id = required(Some(route_id), "route id")?;
        self.edit(move |data, now| {
            let route = data
                .find_route(&route_id)
                .ok_or_else(|| Error::NotFound(format!("route {route_id}")))?;
            let deleted_at = now.max(route.local_timestamp());
            Ok(delete(data, TombstoneTarget::Route(route_id), deleted_at))
        })
        .await
    }

    pub async fn delete_attempt(&self, attempt_id: &str) -> Result<TombstoneOutcome> {
        let attempt_id = required(Some(attempt_id), "attempt id")?;
        self.edit(move |data, now| {
            let attempt = data
                .find_attempt(&attempt_id)
                .ok_or_else(|| Error::NotFound(format!("attempt {attempt_id}")))?;
            let deleted_at = now.max(attempt.local_timestamp());
            Ok(delete(data, TombstoneTarget::Attempt(attempt_id), deleted_at))
        })
        .await
    }

    /// Merge externally supplied rows as if the user had entered them.
    ///
    /// Records the import changes are queued; tombstones in the batch are
    /// logged for push.
    pub async fn import_rows(&self, rows: Vec<SyncRow>) -> Result<ImportSummary> {
        let (mut summary, queued) = self
            .edit_counted(move |data, now| {
                let outcome = apply_sync_rows(data, &rows, now);
                *data = outcome.data;
                Ok(EditOutcome {
                    value: ImportSummary {
                        merge: outcome.merge,
                        tombstones: outcome.tombstones,
                        skipped_rows: outcome.skipped_rows,
                        queued: 0,
                    },
                    tombstones: rows
                        .into_iter()
                        .filter(|row| row.parsed_type().is_some_and(|kind| kind.is_tombstone()))
                        .collect(),
                })
            })
            .await?;
        summary.queued = queued;
        Ok(summary)
    }

    /// Snapshot of every local record as wire rows.
    pub async fn export_rows(&self) -> Result<Vec<SyncRow>> {
        Ok(build_sync_rows_from_data(&self.service.load_data().await?))
    }

    async fn edit<T>(
        &self,
        operation: impl FnOnce(&mut DataStore, i64) -> Result<EditOutcome<T>>,
    ) -> Result<T> {
        Ok(self.edit_counted(operation).await?.0)
    }

    /// Run one edit against the stored records in a single transaction.
    /// Returns the edit's value and the number of rows queued for push.
    async fn edit_counted<T>(
        &self,
        operation: impl FnOnce(&mut DataStore, i64) -> Result<EditOutcome<T>>,
    ) -> Result<(T, usize)> {
        let user_key = self.user_key.clone();
        self.service
            .transaction(move |conn| {
                let repo = SqliteDataRepository::new(conn);
                let before = repo.load()?;
                let mut after = before.clone();
                let outcome = operation(&mut after, now_ms())?;
                repo.save(&after)?;
                let queued = record_changes(conn, &user_key, &before, &after, &outcome.tombstones)?;
                tracing::debug!("Local edit queued {queued} rows");
                Ok((outcome.value, queued))
            })
            .await
    }
}

fn required(value: Option<&str>, field: &str) -> Result<String> {
    normalize_text_ref(value).ok_or_else(|| Error::InvalidInput(format!("{field} is required")))
}

fn touch_gym(data: &mut DataStore, name: &str, now: i64) -> Gym {
    if let Some(gym) = data.gyms.iter_mut().find(|gym| gym.matches(name)) {
        gym.updated_at = Some(now);
        return gym.clone();
    }
    let gym = Gym {
        name: name.to_string(),
        created_at: now,
        updated_at: Some(now),
    };
    data.gyms.push(gym.clone());
    gym
}

fn delete(
    data: &mut DataStore,
    target: TombstoneTarget,
    deleted_at: i64,
) -> EditOutcome<TombstoneOutcome> {
    let row = build_tombstone_row(target.kind(), target.identity(), deleted_at);
    let outcome = apply_tombstones(
        data,
        &[Tombstone {
            target,
            updated_at: Some(deleted_at),
        }],
    );
    EditOutcome {
        value: outcome,
        tombstones: vec![row],
    }
}

/// Queue rows for records that changed, drop queued rows of records that
/// disappeared, and log tombstones. Returns the number of rows queued.
fn record_changes(
    conn: &Connection,
    user_key: &str,
    before: &DataStore,
    after: &DataStore,
    tombstones: &[SyncRow],
) -> Result<usize> {
    let changed = changed_rows(before, after);
    let removed = removed_keys(before, after);
    let revived: Vec<String> = changed.iter().filter_map(SyncRow::identity_key).collect();

    let queue = SqliteSyncQueueRepository::new(conn);
    queue.remove_sync_rows(user_key, &removed)?;
    queue.add_sync_rows(user_key, &changed)?;

    let log = SqliteTombstoneRepository::new(conn);
    log.remove_tombstones(user_key, &revived)?;
    log.add_tombstones(user_key, tombstones)?;
    Ok(changed.len())
}

/// Rows for records that are new or differ from their previous version
fn changed_rows(before: &DataStore, after: &DataStore) -> Vec<SyncRow> {
    let gyms = changed_records(&before.gyms, &after.gyms).map(build_gym_sync_row);
    let routes = changed_records(&before.routes, &after.routes).map(build_route_sync_row);
    let attempts =
        changed_records(&before.attempts, &after.attempts).map(build_attempt_sync_row);
    gyms.chain(routes).chain(attempts).collect()
}

fn changed_records<'a, T: SyncRecord + PartialEq>(
    before: &'a [T],
    after: &'a [T],
) -> impl Iterator<Item = &'a T> {
    let previous: HashMap<String, &T> = before
        .iter()
        .map(|record| (record.merge_key(), record))
        .collect();
    after
        .iter()
        .filter(move |record| previous.get(&record.merge_key()) != Some(record))
}

/// Queue keys of records present before but not after
fn removed_keys(before: &DataStore, after: &DataStore) -> Vec<String> {
    let key = |kind: EntityKind, identity: &str| format!("{}:{identity}", kind.key_prefix());
    let kept: HashSet<String> = after
        .gyms
        .iter()
        .map(|gym| key(EntityKind::Gym, &gym.name))
        .chain(after.routes.iter().map(|route| key(EntityKind::Route, &route.route_id)))
        .chain(
            after
                .attempts
                .iter()
                .map(|attempt| key(EntityKind::Attempt, &attempt.attempt_id)),
        )
        .collect();
    before
        .gyms
        .iter()
        .map(|gym| key(EntityKind::Gym, &gym.name))
        .chain(before.routes.iter().map(|route| key(EntityKind::Route, &route.route_id)))
        .chain(
            before
                .attempts
                .iter()
                .map(|attempt| key(EntityKind::Attempt, &attempt.attempt_id)),
        )
        .filter(|identity| !kept.contains(identity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttemptIndexValue, RecordType};
    use pretty_assertions::assert_eq;

    async fn editor() -> LocalEditor {
        LocalEditor::new(DatabaseService::open_in_memory().await.unwrap(), "u1")
    }

    fn draft(gym: &str, grade: &str) -> RouteDraft {
        RouteDraft {
            gym_name: gym.to_string(),
            rope_number: "4".to_string(),
            color: "Blue".to_string(),
            set_date: "2024-05-01".to_string(),
            grade: grade.to_string(),
        }
    }

    fn attempt_draft(route_id: &str) -> AttemptDraft {
        AttemptDraft {
            route_id: route_id.to_string(),
            climb_date: "2024-05-02".to_string(),
            climb_style: ClimbStyle::Lead,
            completion_style: CompletionStyle::SendClean,
            notes: "  felt good  ".to_string(),
        }
    }

    fn queued_keys(rows: &[SyncRow]) -> Vec<String> {
        rows.iter().filter_map(SyncRow::identity_key).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_route_creates_missing_gym_and_queues_both() {
        let editor = editor().await;
        let route = editor.upsert_route(draft("Base", "5.10A")).await.unwrap();
        assert_eq!(route.grade, "5.10a");
        assert_eq!(route.route_id, to_route_id("Base", "4", "Blue", "2024-05-01"));

        let data = editor.service.load_data().await.unwrap();
        assert_eq!(data.gyms.len(), 1);
        assert_eq!(
            queued_keys(&editor.service.read_sync_queue("u1").await.unwrap()),
            vec!["gym:Base".to_string(), format!("route:{}", route.route_id)]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_regrading_one_route_queues_only_that_route() {
        let editor = editor().await;
        let first = editor.upsert_route(draft("Base", "5.9")).await.unwrap();
        let second = editor
            .upsert_route(RouteDraft {
                rope_number: "5".to_string(),
                ..draft("Base", "5.10c")
            })
            .await
            .unwrap();
        editor.service.clear_sync_queue("u1").await.unwrap();

        editor.upsert_route(draft("Base", "5.10a")).await.unwrap();

        assert_eq!(
            queued_keys(&editor.service.read_sync_queue("u1").await.unwrap()),
            vec![format!("route:{}", first.route_id)]
        );
        let data = editor.service.load_data().await.unwrap();
        assert_eq!(data.find_route(&second.route_id).unwrap().grade, "5.10c");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_route_rejects_bad_grade() {
        let editor = editor().await;
        let error = editor.upsert_route(draft("Base", "hard")).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(editor.service.load_data().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_gym_matches_existing_name_case_insensitively() {
        let editor = editor().await;
        editor.upsert_gym("Base Camp").await.unwrap();
        let gym = editor.upsert_gym("  base camp ").await.unwrap();
        assert_eq!(gym.name, "Base Camp");
        assert_eq!(editor.service.load_data().await.unwrap().gyms.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_attempts_are_numbered_per_route_and_day() {
        let editor = editor().await;
        let route = editor.upsert_route(draft("Base", "5.9")).await.unwrap();
        let first = editor.record_attempt(attempt_draft(&route.route_id)).await.unwrap();
        let second = editor.record_attempt(attempt_draft(&route.route_id)).await.unwrap();

        assert_eq!(first.attempt_index, 1);
        assert_eq!(second.attempt_index, 2);
        assert_eq!(first.notes, "felt good");

        let queue = editor.service.read_sync_queue("u1").await.unwrap();
        let attempt_row = queue
            .iter()
            .find(|row| row.attempt_id.as_deref() == Some(second.attempt_id.as_str()))
            .unwrap();
        assert_eq!(attempt_row.attempt_index, Some(AttemptIndexValue::from(2_u32)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_attempt_for_unknown_route_is_not_found() {
        let editor = editor().await;
        let error = editor.record_attempt(attempt_draft("missing")).await.unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_gym_cascades_and_logs_tombstone() {
        let editor = editor().await;
        let route = editor.upsert_route(draft("Base", "5.9")).await.unwrap();
        editor.record_attempt(attempt_draft(&route.route_id)).await.unwrap();

        let outcome = editor.delete_gym("BASE").await.unwrap();
        assert_eq!(outcome.removed_gyms, 1);
        assert_eq!(outcome.removed_routes, 1);
        assert_eq!(outcome.removed_attempts, 1);
        assert!(editor.service.load_data().await.unwrap().is_empty());

        // queued rows of deleted records are dropped; only the delete remains
        assert!(editor.service.read_sync_queue("u1").await.unwrap().is_empty());
        let tombstones = editor.service.read_tombstones("u1").await.unwrap();
        assert_eq!(tombstones.len(), 1);
        assert_eq!(tombstones[0].parsed_type(), Some(RecordType::TombstoneGym));
        assert_eq!(tombstones[0].gym_name.as_deref(), Some("Base"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recreating_a_deleted_route_forgets_its_tombstone() {
        let editor = editor().await;
        let route = editor.upsert_route(draft("Base", "5.9")).await.unwrap();
        editor.delete_route(&route.route_id).await.unwrap();
        assert_eq!(editor.service.read_tombstones("u1").await.unwrap().len(), 1);

        editor.upsert_route(draft("Base", "5.9")).await.unwrap();
        assert!(editor.service.read_tombstones("u1").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_missing_attempt_is_not_found() {
        let editor = editor().await;
        assert!(matches!(
            editor.delete_attempt("nope").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_import_queues_changes_and_logs_tombstones() {
        let source = editor().await;
        let route = source.upsert_route(draft("Base", "5.9")).await.unwrap();
        source.record_attempt(attempt_draft(&route.route_id)).await.unwrap();
        let mut rows = source.export_rows().await.unwrap();
        rows.push(build_tombstone_row(EntityKind::Gym, "Elsewhere", 1));

        let target = editor().await;
        let summary = target.import_rows(rows.clone()).await.unwrap();
        assert_eq!(summary.merge.added_gyms, 1);
        assert_eq!(summary.merge.added_routes, 1);
        assert_eq!(summary.merge.added_attempts, 1);
        assert_eq!(summary.queued, 3);
        assert_eq!(target.service.read_tombstones("u1").await.unwrap().len(), 1);

        // importing the same rows again changes nothing
        let again = target.import_rows(rows).await.unwrap();
        assert_eq!(again.queued, 0);
        assert_eq!(again.merge.total_changes(), 0);
    }
}
