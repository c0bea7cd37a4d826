//! Local records to wire rows

use crate::models::{Attempt, DataStore, EntityKind, Gym, RecordType, Route, SyncRow};
use crate::util::{format_timestamp_ms, normalize_text_ref};

pub fn build_gym_sync_row(gym: &Gym) -> SyncRow {
    SyncRow {
        gym_name: Some(gym.name.clone()),
        created_at: Some(format_timestamp_ms(gym.created_at)),
        updated_at: gym.updated_at.map(format_timestamp_ms),
        ..SyncRow::of_type(RecordType::Gym)
    }
}

pub fn build_route_sync_row(route: &Route) -> SyncRow {
    SyncRow {
        gym_name: Some(route.gym_name.clone()),
        route_id: Some(route.route_id.clone()),
        rope_number: Some(route.rope_number.clone()),
        color: Some(route.color.clone()),
        set_date: Some(route.set_date.clone()),
        grade: Some(route.grade.clone()),
        created_at: Some(format_timestamp_ms(route.created_at)),
        updated_at: route.updated_at.map(format_timestamp_ms),
        ..SyncRow::of_type(RecordType::Route)
    }
}

/// Attempt row; the index travels as decimal text.
pub fn build_attempt_sync_row(attempt: &Attempt) -> SyncRow {
    SyncRow {
        route_id: Some(attempt.route_id.clone()),
        attempt_id: Some(attempt.attempt_id.clone()),
        climb_date: Some(attempt.climb_date.clone()),
        attempt_index: Some(attempt.attempt_index.into()),
        climb_style: Some(attempt.climb_style.as_str().to_string()),
        completion_style: Some(attempt.completion_style.as_str().to_string()),
        notes: normalize_text_ref(Some(&attempt.notes)),
        created_at: Some(format_timestamp_ms(attempt.created_at)),
        updated_at: attempt.updated_at.map(format_timestamp_ms),
        ..SyncRow::of_type(RecordType::Attempt)
    }
}

/// Delete marker for one entity, stamped with `deleted_at`
pub fn build_tombstone_row(kind: EntityKind, identity: &str, deleted_at: i64) -> SyncRow {
    let mut row = SyncRow {
        updated_at: Some(format_timestamp_ms(deleted_at)),
        ..SyncRow::of_type(RecordType::tombstone_for(kind))
    };
    let identity = Some(identity.to_string());
    match kind {
        EntityKind::Gym => row.gym_name = identity,
        EntityKind::Route => row.route_id = identity,
        EntityKind::Attempt => row.attempt_id = identity,
    }
    row
}

/// Full snapshot of a store as rows: gyms, then routes, then attempts.
pub fn build_sync_rows_from_data(data: &DataStore) -> Vec<SyncRow> {
    data.gyms
        .iter()
        .map(build_gym_sync_row)
        .chain(data.routes.iter().map(build_route_sync_row))
        .chain(data.attempts.iter().map(build_attempt_sync_row))
        .collect()
}

/// Sync key of a row: its explicit `sync_key`, else `<kind>:<identity>`.
pub fn sync_key_for(row: &SyncRow) -> Option<String> {
    row.cursor_key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttemptIndexValue, ClimbStyle, CompletionStyle};
    use crate::normalize::{parse_row, CanonicalRow};
    use pretty_assertions::assert_eq;

    const JAN_1: i64 = 1_704_067_200_000;

    fn sample_attempt() -> Attempt {
        Attempt {
            attempt_id: "a1".to_string(),
            route_id: "Base:1:Red:2024-01-01".to_string(),
            climb_date: "2024-01-05".to_string(),
            attempt_index: 2,
            climb_style: ClimbStyle::Lead,
            completion_style: CompletionStyle::SendRested,
            notes: "crux at the roof".to_string(),
            created_at: JAN_1,
            updated_at: Some(JAN_1 + 1),
        }
    }

    #[test]
    fn test_attempt_row_uses_iso_timestamps_and_text_index() {
        let row = build_attempt_sync_row(&sample_attempt());
        assert_eq!(row.record_type, "attempt");
        assert_eq!(
            row.attempt_index,
            Some(AttemptIndexValue::Text("2".to_string()))
        );
        assert_eq!(row.created_at.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(row.updated_at.as_deref(), Some("2024-01-01T00:00:00.001Z"));
        assert_eq!(row.climb_style.as_deref(), Some("lead"));
        assert_eq!(sync_key_for(&row).as_deref(), Some("attempt:a1"));
    }

    #[test]
    fn test_built_rows_parse_back_to_the_same_attempt() {
        let attempt = sample_attempt();
        let parsed = parse_row(&build_attempt_sync_row(&attempt), 0).unwrap();
        assert_eq!(parsed, CanonicalRow::Attempt(attempt));
    }

    #[test]
    fn test_gym_row_omits_missing_updated_at() {
        let row = build_gym_sync_row(&Gym {
            name: "Base".to_string(),
            created_at: JAN_1,
            updated_at: None,
        });
        assert_eq!(row.updated_at, None);
        assert_eq!(sync_key_for(&row).as_deref(), Some("gym:Base"));
    }

    #[test]
    fn test_tombstone_row_targets_identity_field() {
        let row = build_tombstone_row(EntityKind::Route, "R1", JAN_1);
        assert_eq!(row.record_type, "tombstone_route");
        assert_eq!(row.route_id.as_deref(), Some("R1"));
        assert_eq!(row.updated_at.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(sync_key_for(&row).as_deref(), Some("route:R1"));
    }

    #[test]
    fn test_snapshot_lists_gyms_routes_then_attempts() {
        let data = DataStore {
            gyms: vec![Gym {
                name: "Base".to_string(),
                created_at: JAN_1,
                updated_at: None,
            }],
            attempts: vec![sample_attempt()],
            ..DataStore::empty()
        };
        let types: Vec<_> = build_sync_rows_from_data(&data)
            .into_iter()
            .map(|row| row.record_type)
            .collect();
        assert_eq!(types, vec!["gym", "attempt"]);
    }
}
