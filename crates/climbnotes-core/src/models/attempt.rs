//! Attempt model

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::SyncRecord;

/// How the route was climbed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClimbStyle {
    #[default]
    TopRope,
    Lead,
}

impl ClimbStyle {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopRope => "top_rope",
            Self::Lead => "lead",
        }
    }

    /// Parse loosely; anything other than `lead` is top rope.
    pub fn parse_lossy(value: Option<&str>) -> Self {
        match value.map(|value| value.trim().to_lowercase()).as_deref() {
            Some("lead") => Self::Lead,
            _ => Self::TopRope,
        }
    }
}

impl fmt::Display for ClimbStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStyle {
    SendClean,
    SendRested,
    #[default]
    Attempt,
}

impl CompletionStyle {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendClean => "send_clean",
            Self::SendRested => "send_rested",
            Self::Attempt => "attempt",
        }
    }

    /// Parse loosely; unknown values count as a plain attempt.
    pub fn parse_lossy(value: Option<&str>) -> Self {
        match value.map(|value| value.trim().to_lowercase()).as_deref() {
            Some("send_clean") => Self::SendClean,
            Some("send_rested") => Self::SendRested,
            _ => Self::Attempt,
        }
    }
}

impl fmt::Display for CompletionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One climb of a route on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// Opaque identifier (UUID v7 when generated locally)
    pub attempt_id: String,
    /// Foreign key into routes
    pub route_id: String,
    pub climb_date: String,
    /// 1-based ordinal within `(route_id, climb_date)`; 0 marks an unknown index
    pub attempt_index: u32,
    #[serde(default)]
    pub climb_style: ClimbStyle,
    #[serde(default)]
    pub completion_style: CompletionStyle,
    #[serde(default)]
    pub notes: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Attempt {
    /// Create an attempt with a fresh id, stamped with the current time
    #[must_use]
    pub fn new(
        route_id: impl Into<String>,
        climb_date: impl Into<String>,
        attempt_index: u32,
    ) -> Self {
        let now = crate::util::now_ms();
        Self {
            attempt_id: new_attempt_id(),
            route_id: route_id.into(),
            climb_date: climb_date.into(),
            attempt_index,
            climb_style: ClimbStyle::default(),
            completion_style: CompletionStyle::default(),
            notes: String::new(),
            created_at: now,
            updated_at: Some(now),
        }
    }

    /// Whether this attempt belongs to the `(route_id, climb_date)` group
    pub fn in_group(&self, route_id: &str, climb_date: &str) -> bool {
        self.route_id == route_id && self.climb_date == climb_date
    }
}

/// Generate a time-sortable attempt id.
pub fn new_attempt_id() -> String {
    Uuid::now_v7().to_string()
}

impl SyncRecord for Attempt {
    fn merge_key(&self) -> String {
        self.attempt_id.clone()
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn adopt_identity(mut self, existing: &Self) -> Self {
        self.attempt_id.clone_from(&existing.attempt_id);
        self
    }

    fn set_created_at(&mut self, created_at: i64) {
        self.created_at = created_at;
    }
}
