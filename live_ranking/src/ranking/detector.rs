//! Position change detection between consecutive snapshots.

use super::models::{PositionChange, RankingEntry, RankingView};
use crate::scoring::ParticipantId;
use std::collections::HashMap;

/// Diffs a new entry order against the snapshot it superseded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    /// Signed moves of participants present in both rankings, ordered by new
    /// position. Empty when there is no prior snapshot.
    pub fn diff(prior: Option<&RankingView>, entries: &[RankingEntry]) -> Vec<PositionChange> {
        let Some(prior) = prior else {
            return Vec::new();
        };

        let old_positions: HashMap<ParticipantId, u32> = prior
            .entries
            .iter()
            .map(|e| (e.participant_id, e.position))
            .collect();

        let mut changes: Vec<PositionChange> = entries
            .iter()
            .filter_map(|entry| {
                let old = *old_positions.get(&entry.participant_id)?;
                (old != entry.position).then(|| PositionChange {
                    participant_id: entry.participant_id,
                    rider_name: entry.rider_name.clone(),
                    horse_name: entry.horse_name.clone(),
                    old_position: old,
                    new_position: entry.position,
                    change: old as i32 - entry.position as i32,
                })
            })
            .collect();

        changes.sort_by_key(|c| c.new_position);
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::models::RankingSnapshot;
    use crate::scoring::Score;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn entry(participant_id: i64, position: u32) -> RankingEntry {
        RankingEntry {
            participant_id,
            rider_name: format!("Rider {participant_id}"),
            horse_name: format!("Horse {participant_id}"),
            position,
            previous_position: None,
            position_change: 0,
            total_score: Score::ZERO,
            percentage_score: 0.0,
            judge_scores: BTreeMap::new(),
            evaluations_completed: 0,
            evaluations_total: 0,
            is_tied: false,
            tied_with: Vec::new(),
        }
    }

    fn view(entries: Vec<RankingEntry>) -> RankingView {
        RankingView {
            snapshot: RankingSnapshot {
                id: 1,
                competition_id: 1,
                category_id: 1,
                created_at: Utc::now(),
                total_participants: entries.len() as u32,
                completed_evaluations: 0,
                total_evaluations: 0,
                progress_percentage: 0.0,
                is_current: false,
                is_final: false,
            },
            entries,
        }
    }

    #[test]
    fn test_no_prior_snapshot_means_no_changes() {
        assert!(ChangeDetector::diff(None, &[entry(1, 1)]).is_empty());
    }

    #[test]
    fn test_move_up_is_positive() {
        let prior = view(vec![
            entry(1, 1),
            entry(2, 2),
            entry(3, 3),
            entry(4, 4),
            entry(5, 5),
        ]);
        let next = vec![
            entry(1, 1),
            entry(5, 2),
            entry(2, 3),
            entry(3, 4),
            entry(4, 5),
        ];

        let changes = ChangeDetector::diff(Some(&prior), &next);
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0].participant_id, 5);
        assert_eq!(changes[0].old_position, 5);
        assert_eq!(changes[0].new_position, 2);
        assert_eq!(changes[0].change, 3);
        assert!(changes[1..].iter().all(|c| c.change == -1));
    }

    #[test]
    fn test_new_participants_are_ignored() {
        let prior = view(vec![entry(1, 1)]);
        let changes = ChangeDetector::diff(Some(&prior), &[entry(9, 1), entry(1, 2)]);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].participant_id, 1);
        assert_eq!(changes[0].change, -1);
    }

    #[test]
    fn test_unchanged_order_yields_nothing() {
        let prior = view(vec![entry(1, 1), entry(2, 2)]);
        assert!(ChangeDetector::diff(Some(&prior), &[entry(1, 1), entry(2, 2)]).is_empty());
    }
}
