//! Route model and grade helpers

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::SyncRecord;

static BARE_GRADE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+([abcd]|[+-])?$").expect("Invalid regex"));
static YDS_GRADE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^5\.(\d+)([abcd]|[+-])?$").expect("Invalid regex"));

/// A roped route set at a gym.
///
/// `route_id` is content-addressed (see [`to_route_id`]); changing any of its
/// components produces a different route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub gym_name: String,
    pub rope_number: String,
    pub color: String,
    pub set_date: String,
    /// Yosemite Decimal System grade, lowercase (`5.10a`)
    pub grade: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Route {
    /// Create a route with a derived id, stamped with the current time
    #[must_use]
    pub fn new(
        gym_name: impl Into<String>,
        rope_number: impl Into<String>,
        color: impl Into<String>,
        set_date: impl Into<String>,
        grade: &str,
    ) -> Self {
        let gym_name = gym_name.into();
        let rope_number = rope_number.into();
        let color = color.into();
        let set_date = set_date.into();
        let now = crate::util::now_ms();
        Self {
            route_id: to_route_id(&gym_name, &rope_number, &color, &set_date),
            gym_name,
            rope_number,
            color,
            set_date,
            grade: normalize_grade(grade),
            created_at: now,
            updated_at: Some(now),
        }
    }
}

impl SyncRecord for Route {
    fn merge_key(&self) -> String {
        self.route_id.clone()
    }

    fn created_at(&self) -> i64 {
        self.created_at
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn adopt_identity(mut self, existing: &Self) -> Self {
        self.route_id.clone_from(&existing.route_id);
        self
    }

    fn set_created_at(&mut self, created_at: i64) {
        self.created_at = created_at;
    }
}

/// Build the deterministic route id `gym:rope:color:set_date`.
pub fn to_route_id(gym_name: &str, rope_number: &str, color: &str, set_date: &str) -> String {
    format!("{gym_name}:{rope_number}:{color}:{set_date}")
}

/// Lowercase a grade and prefix bare numeric grades with `5.`.
///
/// Returns an empty string for blank input and leaves unrecognized text as is
/// so that [`is_valid_grade`] can reject it.
pub fn normalize_grade(value: &str) -> String {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() || trimmed.starts_with("5.") {
        return trimmed;
    }
    if BARE_GRADE.is_match(&trimmed) {
        return format!("5.{trimmed}");
    }
    trimmed
}

/// Check a grade against the Yosemite Decimal System form `5.<n>[abcd+-]`.
pub fn is_valid_grade(value: &str) -> bool {
    YDS_GRADE.is_match(&normalize_grade(value))
}
