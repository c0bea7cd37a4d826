//! Wire representation shared by import, the outbox and the remote store

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::util::normalize_text_ref;

/// Kind of record carried by a [`SyncRow`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Gym,
    Route,
    Attempt,
    TombstoneGym,
    TombstoneRoute,
    TombstoneAttempt,
}

/// Entity addressed by a record type, live or tombstone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Gym,
    Route,
    Attempt,
}

impl EntityKind {
    /// Prefix used in sync keys
    pub const fn key_prefix(self) -> &'static str {
        match self {
            Self::Gym => "gym",
            Self::Route => "route",
            Self::Attempt => "attempt",
        }
    }
}

impl RecordType {
    pub const ALL: [Self; 6] = [
        Self::Gym,
        Self::Route,
        Self::Attempt,
        Self::TombstoneGym,
        Self::TombstoneRoute,
        Self::TombstoneAttempt,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gym => "gym",
            Self::Route => "route",
            Self::Attempt => "attempt",
            Self::TombstoneGym => "tombstone_gym",
            Self::TombstoneRoute => "tombstone_route",
            Self::TombstoneAttempt => "tombstone_attempt",
        }
    }

    pub const fn is_tombstone(self) -> bool {
        matches!(
            self,
            Self::TombstoneGym | Self::TombstoneRoute | Self::TombstoneAttempt
        )
    }

    pub const fn entity(self) -> EntityKind {
        match self {
            Self::Gym | Self::TombstoneGym => EntityKind::Gym,
            Self::Route | Self::TombstoneRoute => EntityKind::Route,
            Self::Attempt | Self::TombstoneAttempt => EntityKind::Attempt,
        }
    }

    /// Tombstone type deleting the given entity kind
    pub const fn tombstone_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Gym => Self::TombstoneGym,
            EntityKind::Route => Self::TombstoneRoute,
            EntityKind::Attempt => Self::TombstoneAttempt,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    /// Trims and lowercases before matching the fixed set of types.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|record_type| record_type.as_str() == normalized)
            .ok_or(normalized)
    }
}

/// `attempt_index` arrives as either text or a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttemptIndexValue {
    Text(String),
    Number(serde_json::Number),
}

impl AttemptIndexValue {
    /// Text form, keeping the exact digits of numeric input
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        }
    }
}

impl From<String> for AttemptIndexValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u32> for AttemptIndexValue {
    fn from(value: u32) -> Self {
        Self::Text(value.to_string())
    }
}

/// Loosely typed row as produced by import files, the outbox, or the remote.
///
/// All payload fields are optional; [`crate::normalize`] turns a row into a
/// canonical or typed form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_key: Option<String>,
    #[serde(default)]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gym_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rope_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climb_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_index: Option<AttemptIndexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub climb_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_epoch_ms"
    )]
    pub updated_at_ms: Option<i64>,
}

impl SyncRow {
    /// Row with only a record type set
    #[must_use]
    pub fn of_type(record_type: RecordType) -> Self {
        Self {
            record_type: record_type.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Parsed record type, if it is one of the known six
    pub fn parsed_type(&self) -> Option<RecordType> {
        self.record_type.parse().ok()
    }

    /// Identity value for the row's entity kind (name, route id, attempt id)
    pub fn identity(&self, kind: EntityKind) -> Option<&str> {
        let value = match kind {
            EntityKind::Gym => self.gym_name.as_deref(),
            EntityKind::Route => self.route_id.as_deref(),
            EntityKind::Attempt => self.attempt_id.as_deref(),
        };
        value.filter(|value| !value.trim().is_empty())
    }

    /// Sync key derived from type and identity (`gym:<name>`, `route:<id>`,
    /// `attempt:<id>`), for live rows and tombstones alike.
    pub fn identity_key(&self) -> Option<String> {
        let kind = self.parsed_type()?.entity();
        let identity = self.identity(kind)?;
        Some(format!("{}:{identity}", kind.key_prefix()))
    }

    /// Key used to order rows for cursor tracking: an explicit `sync_key`
    /// when the remote supplied one, otherwise the derived identity key.
    pub fn cursor_key(&self) -> Option<String> {
        normalize_text_ref(self.sync_key.as_deref()).or_else(|| self.identity_key())
    }

    /// Row timestamp in Unix ms, preferring `updated_at_ms`
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.updated_at_ms.or_else(|| {
            self.updated_at
                .as_deref()
                .and_then(crate::util::parse_timestamp_ms)
        })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn deserialize_epoch_ms<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(value.and_then(|number| {
        number
            .as_i64()
            .or_else(|| number.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms as i64))
    }))
}
