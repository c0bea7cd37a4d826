//! Newest-wins merge of incoming records into the local store

use std::collections::{HashMap, HashSet};

use crate::models::{gym_key, DataStore, Gym, SyncRecord};
use crate::normalize::ParsedBatch;

use super::renumber::renumber_attempts;

/// Added/updated counts for one entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeCount {
    pub added: usize,
    pub updated: usize,
}

/// Result of merging a parsed batch into a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub data: DataStore,
    pub added_gyms: usize,
    pub updated_gyms: usize,
    pub added_routes: usize,
    pub updated_routes: usize,
    pub added_attempts: usize,
    pub updated_attempts: usize,
    /// Attempts dropped because their route is absent after the merge
    pub skipped_attempts: usize,
    /// Attempts whose index was rewritten to repair their group
    pub renumbered_attempts: usize,
}

impl MergeSummary {
    pub const fn total_changes(&self) -> usize {
        self.added_gyms
            + self.updated_gyms
            + self.added_routes
            + self.updated_routes
            + self.added_attempts
            + self.updated_attempts
            + self.renumbered_attempts
    }
}

/// Whether `incoming` should replace `existing`.
///
/// A record without `updated_at` never wins; one with `updated_at` beats an
/// existing record that has none. Equal timestamps keep the existing record.
pub const fn is_incoming_newer(incoming: Option<i64>, existing: Option<i64>) -> bool {
    match (incoming, existing) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(incoming), Some(existing)) => incoming > existing,
    }
}

/// Reconcile `incoming` against `existing` by identity.
///
/// Existing order is preserved and new records are appended in arrival
/// order. A replacing record keeps the existing identity field and the
/// earlier of the two creation times.
pub fn merge_records<T: SyncRecord>(existing: &[T], incoming: Vec<T>) -> (Vec<T>, MergeCount) {
    let mut merged = existing.to_vec();
    let mut positions: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(index, record)| (record.merge_key(), index))
        .collect();
    let mut count = MergeCount::default();

    for record in incoming {
        let key = record.merge_key();
        let Some(&position) = positions.get(&key) else {
            positions.insert(key, merged.len());
            merged.push(record);
            count.added += 1;
            continue;
        };

        let current = &merged[position];
        if !is_incoming_newer(record.updated_at(), current.updated_at()) {
            continue;
        }
        let created_at = current.created_at().min(record.created_at());
        let mut replacement = record.adopt_identity(current);
        replacement.set_created_at(created_at);
        merged[position] = replacement;
        count.updated += 1;
    }

    (merged, count)
}

/// Merge a parsed batch into `current`.
///
/// Routes referencing an unknown gym get a synthetic gym (borrowing the
/// route's creation time) before gyms are merged. Attempts whose route is
/// missing after the route merge are dropped and counted. Attempt ordinals
/// are repaired before returning. Tombstones in the batch are ignored here.
pub fn merge(current: &DataStore, incoming: ParsedBatch) -> MergeSummary {
    let ParsedBatch {
        mut gyms,
        routes,
        attempts,
        ..
    } = incoming;

    let mut gym_keys: HashSet<String> = gyms.iter().map(Gym::key).collect();
    for route in &routes {
        if gym_keys.insert(gym_key(&route.gym_name)) {
            gyms.push(Gym {
                name: route.gym_name.clone(),
                created_at: route.created_at,
                updated_at: None,
            });
        }
    }

    let (merged_gyms, gym_count) = merge_records(&current.gyms, gyms);
    let (merged_routes, route_count) = merge_records(&current.routes, routes);

    let route_ids: HashSet<&str> = merged_routes
        .iter()
        .map(|route| route.route_id.as_str())
        .collect();
    let incoming_attempts = attempts.len();
    let attempts: Vec<_> = attempts
        .into_iter()
        .filter(|attempt| route_ids.contains(attempt.route_id.as_str()))
        .collect();
    let skipped_attempts = incoming_attempts - attempts.len();
    if skipped_attempts > 0 {
        tracing::debug!("Dropped {skipped_attempts} attempts referencing unknown routes");
    }

    let (mut merged_attempts, attempt_count) = merge_records(&current.attempts, attempts);
    let renumbered_attempts = renumber_attempts(&mut merged_attempts);

    MergeSummary {
        data: DataStore {
            version: current.version,
            gyms: merged_gyms,
            routes: merged_routes,
            attempts: merged_attempts,
        },
        added_gyms: gym_count.added,
        updated_gyms: gym_count.updated,
        added_routes: route_count.added,
        updated_routes: route_count.updated,
        added_attempts: attempt_count.added,
        updated_attempts: attempt_count.updated,
        skipped_attempts,
        renumbered_attempts,
    }
}
