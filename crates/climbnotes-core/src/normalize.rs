//! Row normalizer: turns loosely typed [`SyncRow`]s into canonical rows and
//! typed records.
//!
//! Normalization never fails loudly. A malformed row yields a
//! [`RowRejection`] which callers count as a skipped row.

use thiserror::Error;

use crate::models::{
    is_valid_grade, new_attempt_id, normalize_grade, to_route_id, Attempt, ClimbStyle,
    CompletionStyle, EntityKind, Gym, RecordType, Route, SyncRow,
};
use crate::util::{normalize_text_option, parse_timestamp_ms};

/// Reason a row was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("row has no record_type")]
    MissingRecordType,
    #[error("unknown record_type: {0}")]
    UnknownRecordType(String),
    #[error("row is missing required field {0}")]
    MissingField(&'static str),
    #[error("invalid grade: {0}")]
    InvalidGrade(String),
}

/// Delete intent for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TombstoneTarget {
    Gym(String),
    Route(String),
    Attempt(String),
}

impl TombstoneTarget {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Gym(_) => EntityKind::Gym,
            Self::Route(_) => EntityKind::Route,
            Self::Attempt(_) => EntityKind::Attempt,
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            Self::Gym(value) | Self::Route(value) | Self::Attempt(value) => value,
        }
    }
}

/// Parsed tombstone: target identity plus the delete timestamp, if known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub target: TombstoneTarget,
    pub updated_at: Option<i64>,
}

/// Strictly typed form of a row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalRow {
    Gym(Gym),
    Route(Route),
    Attempt(Attempt),
    Tombstone(Tombstone),
}

/// Rows of one batch split by kind, ready for the merge engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub gyms: Vec<Gym>,
    pub routes: Vec<Route>,
    pub attempts: Vec<Attempt>,
    pub tombstones: Vec<Tombstone>,
    pub skipped_rows: usize,
}

impl ParsedBatch {
    /// Number of live (non-tombstone) records
    pub fn record_count(&self) -> usize {
        self.gyms.len() + self.routes.len() + self.attempts.len()
    }

    fn push(&mut self, row: CanonicalRow) {
        match row {
            CanonicalRow::Gym(gym) => self.gyms.push(gym),
            CanonicalRow::Route(route) => self.routes.push(route),
            CanonicalRow::Attempt(attempt) => self.attempts.push(attempt),
            CanonicalRow::Tombstone(tombstone) => self.tombstones.push(tombstone),
        }
    }
}

/// Canonicalize a row, or `None` when it must be skipped.
pub fn normalize_row(row: &SyncRow) -> Option<SyncRow> {
    canonicalize(row).ok()
}

/// Canonicalize a row at the wire level.
///
/// The record type is trimmed, lowercased and checked; text fields are
/// trimmed with blanks dropped; `attempt_index` becomes text; grades are
/// lowercased and `5.`-prefixed. A missing route id is derived from the
/// route's components. Rows without their identity field are rejected.
pub fn canonicalize(row: &SyncRow) -> Result<SyncRow, RowRejection> {
    let (record_type, cleaned) = clean(row)?;
    let kind = record_type.entity();
    if cleaned.identity(kind).is_none() {
        return Err(RowRejection::MissingField(identity_field(kind)));
    }
    Ok(cleaned)
}

/// Parse a row into a typed record.
///
/// `now_ms` stands in for a missing `created_at`. Attempts without an id get
/// a fresh one; unparseable or non-positive attempt indices become 0 and are
/// repaired by renumbering after the merge.
pub fn parse_row(row: &SyncRow, now_ms: i64) -> Result<CanonicalRow, RowRejection> {
    let (record_type, row) = clean(row)?;
    let created_at = row
        .created_at
        .as_deref()
        .and_then(parse_timestamp_ms)
        .unwrap_or(now_ms);
    let updated_at = row.timestamp_ms();

    match record_type {
        RecordType::TombstoneGym | RecordType::TombstoneRoute | RecordType::TombstoneAttempt => {
            parse_tombstone(record_type, &row)
        }
        RecordType::Gym => {
            let name = require(row.gym_name, "gym_name")?;
            Ok(CanonicalRow::Gym(Gym {
                name,
                created_at,
                updated_at,
            }))
        }
        RecordType::Route => {
            let gym_name = require(row.gym_name, "gym_name")?;
            let rope_number = require(row.rope_number, "rope_number")?;
            let color = require(row.color, "color")?;
            let set_date = require(row.set_date, "set_date")?;
            let grade = require(row.grade, "grade")?;
            let route_id = require(row.route_id, "route_id")?;
            Ok(CanonicalRow::Route(Route {
                route_id,
                gym_name,
                rope_number,
                color,
                set_date,
                grade,
                created_at,
                updated_at,
            }))
        }
        RecordType::Attempt => {
            let route_id = require(row.route_id, "route_id")?;
            let climb_date = require(row.climb_date, "climb_date")?;
            let attempt_index = row
                .attempt_index
                .as_ref()
                .and_then(|value| parse_leading_int(&value.to_text()))
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(0);
            Ok(CanonicalRow::Attempt(Attempt {
                attempt_id: row.attempt_id.unwrap_or_else(new_attempt_id),
                route_id,
                climb_date,
                attempt_index,
                climb_style: ClimbStyle::parse_lossy(row.climb_style.as_deref()),
                completion_style: CompletionStyle::parse_lossy(row.completion_style.as_deref()),
                notes: row.notes.unwrap_or_default(),
                created_at,
                updated_at,
            }))
        }
    }
}

/// Parse a whole batch, counting rejected rows instead of failing.
pub fn parse_batch(rows: &[SyncRow], now_ms: i64) -> ParsedBatch {
    let mut batch = ParsedBatch::default();
    for row in rows {
        match parse_row(row, now_ms) {
            Ok(parsed) => batch.push(parsed),
            Err(rejection) => {
                tracing::debug!("Skipping row: {rejection}");
                batch.skipped_rows += 1;
            }
        }
    }
    batch
}

/// Compare two canonical rows on payload fields, ignoring the sync key and
/// all timestamps.
pub fn rows_equal(left: &SyncRow, right: &SyncRow) -> bool {
    let strip = |row: &SyncRow| SyncRow {
        sync_key: None,
        created_at: None,
        updated_at: None,
        updated_at_ms: None,
        attempt_index: row.attempt_index.as_ref().map(|value| value.to_text().into()),
        ..row.clone()
    };
    strip(left) == strip(right)
}

fn parse_tombstone(record_type: RecordType, row: &SyncRow) -> Result<CanonicalRow, RowRejection> {
    let kind = record_type.entity();
    let identity = row
        .identity(kind)
        .ok_or(RowRejection::MissingField(identity_field(kind)))?
        .to_string();
    let target = match kind {
        EntityKind::Gym => TombstoneTarget::Gym(identity),
        EntityKind::Route => TombstoneTarget::Route(identity),
        EntityKind::Attempt => TombstoneTarget::Attempt(identity),
    };
    Ok(CanonicalRow::Tombstone(Tombstone {
        target,
        updated_at: row.timestamp_ms(),
    }))
}

fn clean(row: &SyncRow) -> Result<(RecordType, SyncRow), RowRejection> {
    let raw_type = row.record_type.trim();
    if raw_type.is_empty() {
        return Err(RowRejection::MissingRecordType);
    }
    let record_type: RecordType = raw_type
        .parse()
        .map_err(RowRejection::UnknownRecordType)?;

    let text = |value: &Option<String>| normalize_text_option(value.clone());
    let mut cleaned = SyncRow {
        sync_key: text(&row.sync_key),
        record_type: record_type.as_str().to_string(),
        gym_name: text(&row.gym_name),
        route_id: text(&row.route_id),
        attempt_id: text(&row.attempt_id),
        rope_number: text(&row.rope_number),
        color: text(&row.color),
        set_date: text(&row.set_date),
        grade: None,
        climb_date: text(&row.climb_date),
        attempt_index: row
            .attempt_index
            .as_ref()
            .and_then(|value| normalize_text_option(Some(value.to_text())))
            .map(Into::into),
        climb_style: text(&row.climb_style),
        completion_style: text(&row.completion_style),
        notes: text(&row.notes),
        created_at: text(&row.created_at),
        updated_at: text(&row.updated_at),
        updated_at_ms: row.updated_at_ms,
    };

    if let Some(raw_grade) = text(&row.grade) {
        let grade = normalize_grade(&raw_grade);
        if !is_valid_grade(&grade) {
            return Err(RowRejection::InvalidGrade(raw_grade));
        }
        cleaned.grade = Some(grade);
    }

    if record_type == RecordType::Route && cleaned.route_id.is_none() {
        if let (Some(gym), Some(rope), Some(color), Some(set_date)) = (
            cleaned.gym_name.as_deref(),
            cleaned.rope_number.as_deref(),
            cleaned.color.as_deref(),
            cleaned.set_date.as_deref(),
        ) {
            cleaned.route_id = Some(to_route_id(gym, rope, color, set_date));
        }
    }

    Ok((record_type, cleaned))
}

fn require(value: Option<String>, field: &'static str) -> Result<String, RowRejection> {
    value.ok_or(RowRejection::MissingField(field))
}

const fn identity_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Gym => "gym_name",
        EntityKind::Route => "route_id",
        EntityKind::Attempt => "attempt_id",
    }
}

/// Integer prefix of `value` (`"3"`, `"3.0"`, `"+3 "` all give 3).
fn parse_leading_int(value: &str) -> Option<i64> {
    let value = value.trim();
    let (sign, digits) = match value.as_bytes().first() {
        Some(b'-') => (-1, &value[1..]),
        Some(b'+') => (1, &value[1..]),
        _ => (1, value),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|parsed| sign * parsed)
}
