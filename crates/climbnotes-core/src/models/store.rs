//! Local data store snapshot

use serde::{Deserialize, Serialize};

use super::{Attempt, Gym, Route};

const CURRENT_STORE_VERSION: u32 = 1;

const fn default_version() -> u32 {
    CURRENT_STORE_VERSION
}

/// Everything the app knows locally, persisted as a single JSON blob.
///
/// Pipeline stages take a store by reference and return a new one, so a
/// reader never sees a half-merged snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStore {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub gyms: Vec<Gym>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self {
            version: CURRENT_STORE_VERSION,
            gyms: Vec::new(),
            routes: Vec::new(),
            attempts: Vec::new(),
        }
    }
}

impl DataStore {
    /// Empty store at the current version
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn find_gym(&self, name: &str) -> Option<&Gym> {
        self.gyms.iter().find(|gym| gym.matches(name))
    }

    pub fn find_route(&self, route_id: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.route_id == route_id)
    }

    pub fn find_attempt(&self, attempt_id: &str) -> Option<&Attempt> {
        self.attempts
            .iter()
            .find(|attempt| attempt.attempt_id == attempt_id)
    }

    /// Routes set at the named gym
    pub fn routes_for_gym<'a>(&'a self, gym_name: &'a str) -> impl Iterator<Item = &'a Route> {
        self.routes
            .iter()
            .filter(move |route| route.gym_name.to_lowercase() == gym_name.to_lowercase())
    }

    /// Next free ordinal for a `(route_id, climb_date)` group
    pub fn next_attempt_index(&self, route_id: &str, climb_date: &str) -> u32 {
        self.attempts
            .iter()
            .filter(|attempt| attempt.in_group(route_id, climb_date))
            .map(|attempt| attempt.attempt_index)
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn is_empty(&self) -> bool {
        self.gyms.is_empty() && self.routes.is_empty() && self.attempts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_partial_blob_with_defaults() {
        let store: DataStore = serde_json::from_str(r#"{"gyms": []}"#).unwrap();
        assert_eq!(store.version, 1);
        assert!(store.routes.is_empty());
        assert!(store.attempts.is_empty());
    }

    #[test]
    fn test_next_attempt_index_counts_per_group() {
        let mut store = DataStore::empty();
        assert_eq!(store.next_attempt_index("r1", "2024-02-02"), 1);

        store.attempts.push(Attempt::new("r1", "2024-02-02", 1));
        store.attempts.push(Attempt::new("r1", "2024-02-02", 2));
        store.attempts.push(Attempt::new("r1", "2024-02-03", 1));
        assert_eq!(store.next_attempt_index("r1", "2024-02-02"), 3);
        assert_eq!(store.next_attempt_index("r1", "2024-02-03"), 2);
    }

    #[test]
    fn test_finds_gym_case_insensitively() {
        let mut store = DataStore::empty();
        store.gyms.push(Gym::new("Base"));
        assert!(store.find_gym("base").is_some());
        assert!(store.find_gym("Mesa").is_none());
    }
}
