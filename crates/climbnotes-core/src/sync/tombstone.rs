//! Delete propagation with cascade

use std::collections::HashSet;

use crate::models::{gym_key, DataStore, SyncRecord};
use crate::normalize::{Tombstone, TombstoneTarget};

/// Counts from applying a set of tombstones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TombstoneOutcome {
    /// Tombstones that found and deleted their target
    pub applied: usize,
    pub removed_gyms: usize,
    pub removed_routes: usize,
    pub removed_attempts: usize,
}

/// Whether a tombstone stamped `tombstone_ts` deletes `target`.
///
/// Deletes win ties and win whenever the tombstone carries no timestamp.
pub fn tombstone_applies<T: SyncRecord>(tombstone_ts: Option<i64>, target: &T) -> bool {
    tombstone_ts.is_none_or(|ts| ts >= target.local_timestamp())
}

/// Apply delete intents to `data`, cascading from gyms to routes to attempts.
///
/// Gym identity is matched case-insensitively. A tombstone whose target is
/// absent, or older than the target, leaves the store unchanged.
pub fn apply_tombstones(data: &mut DataStore, tombstones: &[Tombstone]) -> TombstoneOutcome {
    let mut outcome = TombstoneOutcome::default();
    for tombstone in tombstones {
        let removed = match &tombstone.target {
            TombstoneTarget::Gym(name) => delete_gym(data, name, tombstone.updated_at),
            TombstoneTarget::Route(route_id) => {
                delete_route(data, route_id, tombstone.updated_at)
            }
            TombstoneTarget::Attempt(attempt_id) => {
                delete_attempt(data, attempt_id, tombstone.updated_at)
            }
        };
        let Some((gyms, routes, attempts)) = removed else {
            continue;
        };
        outcome.applied += 1;
        outcome.removed_gyms += gyms;
        outcome.removed_routes += routes;
        outcome.removed_attempts += attempts;
    }
    if outcome.applied > 0 {
        tracing::debug!(
            "Applied {} tombstones ({} gyms, {} routes, {} attempts removed)",
            outcome.applied,
            outcome.removed_gyms,
            outcome.removed_routes,
            outcome.removed_attempts
        );
    }
    outcome
}

type Removed = Option<(usize, usize, usize)>;

fn delete_gym(data: &mut DataStore, name: &str, tombstone_ts: Option<i64>) -> Removed {
    let key = gym_key(name);
    let gym = data.gyms.iter().find(|gym| gym.key() == key)?;
    if !tombstone_applies(tombstone_ts, gym) {
        return None;
    }

    let route_ids: HashSet<String> = data
        .routes
        .iter()
        .filter(|route| gym_key(&route.gym_name) == key)
        .map(|route| route.route_id.clone())
        .collect();
    let gyms = remove_where(&mut data.gyms, |gym| gym.key() == key);
    let routes = remove_where(&mut data.routes, |route| route_ids.contains(&route.route_id));
    let attempts = remove_where(&mut data.attempts, |attempt| {
        route_ids.contains(&attempt.route_id)
    });
    Some((gyms, routes, attempts))
}

fn delete_route(data: &mut DataStore, route_id: &str, tombstone_ts: Option<i64>) -> Removed {
    let route = data.find_route(route_id)?;
    if !tombstone_applies(tombstone_ts, route) {
        return None;
    }
    let routes = remove_where(&mut data.routes, |route| route.route_id == route_id);
    let attempts = remove_where(&mut data.attempts, |attempt| attempt.route_id == route_id);
    Some((0, routes, attempts))
}

fn delete_attempt(data: &mut DataStore, attempt_id: &str, tombstone_ts: Option<i64>) -> Removed {
    let attempt = data.find_attempt(attempt_id)?;
    if !tombstone_applies(tombstone_ts, attempt) {
        return None;
    }
    let attempts = remove_where(&mut data.attempts, |attempt| attempt.attempt_id == attempt_id);
    Some((0, 0, attempts))
}

fn remove_where<T>(items: &mut Vec<T>, mut predicate: impl FnMut(&T) -> bool) -> usize {
    let before = items.len();
    items.retain(|item| !predicate(item));
    before - items.len()
}
