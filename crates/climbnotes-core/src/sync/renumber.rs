//! Attempt ordinal repair

use std::collections::{BTreeMap, HashSet};

use crate::models::Attempt;

/// Restore contiguous `1..N` numbering within each `(route_id, climb_date)`.
///
/// A group whose indices are all positive and distinct is left exactly as
/// it is, even when it has gaps. Any other group is ordered by
/// `(created_at, attempt_id)` and renumbered from 1. Returns the number of
/// attempts whose index changed.
pub fn renumber_attempts(attempts: &mut [Attempt]) -> usize {
    let mut groups: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
    for (position, attempt) in attempts.iter().enumerate() {
        groups
            .entry((attempt.route_id.as_str(), attempt.climb_date.as_str()))
            .or_default()
            .push(position);
    }

    let mut assignments = Vec::new();
    for mut members in groups.into_values() {
        if is_well_numbered(attempts, &members) {
            continue;
        }
        members.sort_by(|&left, &right| {
            let (left, right) = (&attempts[left], &attempts[right]);
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.attempt_id.cmp(&right.attempt_id))
        });
        for (ordinal, position) in (1_u32..).zip(members) {
            assignments.push((position, ordinal));
        }
    }

    let mut changed = 0;
    for (position, ordinal) in assignments {
        let attempt = &mut attempts[position];
        if attempt.attempt_index != ordinal {
            attempt.attempt_index = ordinal;
            changed += 1;
        }
    }
    if changed > 0 {
        tracing::debug!("Renumbered {changed} attempts");
    }
    changed
}

fn is_well_numbered(attempts: &[Attempt], members: &[usize]) -> bool {
    let mut seen = HashSet::with_capacity(members.len());
    members.iter().all(|&position| {
        let index = attempts[position].attempt_index;
        index >= 1 && seen.insert(index)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClimbStyle, CompletionStyle};
    use pretty_assertions::assert_eq;

    fn attempt(id: &str, date: &str, index: u32, created_at: i64) -> Attempt {
        Attempt {
            attempt_id: id.to_string(),
            route_id: "r1".to_string(),
            climb_date: date.to_string(),
            attempt_index: index,
            climb_style: ClimbStyle::TopRope,
            completion_style: CompletionStyle::Attempt,
            notes: String::new(),
            created_at,
            updated_at: None,
        }
    }

    fn indices(attempts: &[Attempt]) -> Vec<(&str, u32)> {
        attempts
            .iter()
            .map(|attempt| (attempt.attempt_id.as_str(), attempt.attempt_index))
            .collect()
    }

    #[test]
    fn test_duplicate_indices_follow_creation_order() {
        let mut attempts = vec![
            attempt("b", "2024-01-01", 1, 2),
            attempt("a", "2024-01-01", 1, 1),
        ];
        assert_eq!(renumber_attempts(&mut attempts), 1);
        assert_eq!(indices(&attempts), vec![("b", 2), ("a", 1)]);
    }

    #[test]
    fn test_zero_index_triggers_renumbering() {
        let mut attempts = vec![
            attempt("a", "2024-01-01", 4, 1),
            attempt("b", "2024-01-01", 0, 2),
        ];
        renumber_attempts(&mut attempts);
        assert_eq!(indices(&attempts), vec![("a", 1), ("b", 2)]);
    }

    #[test]
    fn test_creation_ties_break_on_attempt_id() {
        let mut attempts = vec![
            attempt("z", "2024-01-01", 2, 5),
            attempt("m", "2024-01-01", 2, 5),
        ];
        renumber_attempts(&mut attempts);
        assert_eq!(indices(&attempts), vec![("z", 2), ("m", 1)]);
    }

    #[test]
    fn test_valid_groups_are_untouched_even_with_gaps() {
        let mut attempts = vec![
            attempt("late", "2024-01-01", 3, 1),
            attempt("early", "2024-01-01", 1, 9),
        ];
        let before = attempts.clone();
        assert_eq!(renumber_attempts(&mut attempts), 0);
        assert_eq!(attempts, before);
    }

    #[test]
    fn test_groups_are_independent_per_day() {
        let mut attempts = vec![
            attempt("a", "2024-01-01", 1, 1),
            attempt("b", "2024-01-02", 1, 2),
            attempt("c", "2024-01-02", 1, 3),
        ];
        renumber_attempts(&mut attempts);
        assert_eq!(indices(&attempts), vec![("a", 1), ("b", 1), ("c", 2)]);
    }

    #[test]
    fn test_renumbering_is_idempotent() {
        let mut attempts = vec![
            attempt("a", "2024-01-01", 0, 3),
            attempt("b", "2024-01-01", 0, 1),
            attempt("c", "2024-01-01", 2, 2),
        ];
        renumber_attempts(&mut attempts);
        let once = attempts.clone();
        assert_eq!(renumber_attempts(&mut attempts), 0);
        assert_eq!(attempts, once);
    }
}
