//! Gym model

use serde::{Deserialize, Serialize};

use super::SyncRecord;

/// A climbing gym. Identity is the case-insensitive name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gym {
    /// Display name, unique ignoring case
    pub name: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Gym {
    /// Create a gym stamped with the current time
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = crate::util::now_ms();
        Self {
            name: name.into(),
            created_at: now,
            updated_at: Some(now),
        }
    }

    /// Identity key used for merging and lookups
    pub fn key(&self) -> String {
        gym_key(&self.name)
    }

    /// Whether `name` refers to this gym
    pub fn matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Case-folded gym identity.
pub fn gym_key(name: &str) -> String {
    name.to_lowercase()
}

impl SyncRecord for Gym {
    fn merge_key(&self) -> String {
        self.key()
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn adopt_identity(mut self, existing: &Self) -> Self {
        self.name.clone_from(&existing.name);
        self
    }

    fn set_created_at(&mut self, created_at: i64) {
        self.created_at = created_at;
    }
}
