/// Property-based tests for ranking order invariants using proptest
///
/// Random evaluation sets are aggregated, tie-resolved and turned into
/// snapshot entries; positions, tie flags and change detection must hold
/// for every input.
use live_ranking::config::TieBreakMethod;
use live_ranking::ranking::{ChangeDetector, SnapshotManager, TieResolver};
use live_ranking::scoring::{
    CompetitionInfo, Evaluation, ParameterScore, Participant, RankingKey, Score, ScoreAggregator,
    ScoringInput, ScoringParameter,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const KEY: RankingKey = RankingKey::new(1, 1);

fn parameters() -> Vec<ScoringParameter> {
    [1u32, 2, 3]
        .iter()
        .enumerate()
        .map(|(i, &coefficient)| ScoringParameter {
            id: i as i64 + 1,
            name: format!("Parameter {}", i + 1),
            coefficient,
        })
        .collect()
}

// Raw marks in half points keep collisions (and therefore ties) likely
fn marks_strategy() -> impl Strategy<Value = Vec<[u8; 3]>> {
    prop::collection::vec(
        (0u8..=20, 0u8..=20, 0u8..=20).prop_map(|(a, b, c)| [a, b, c]),
        1..=25,
    )
}

fn tie_break_strategy() -> impl Strategy<Value = TieBreakMethod> {
    prop_oneof![
        Just(TieBreakMethod::Percentage),
        Just(TieBreakMethod::CollectiveMarks),
        Just(TieBreakMethod::TechnicalScore),
    ]
}

fn input(marks: &[[u8; 3]]) -> ScoringInput {
    let parameters = parameters();
    let participants = (1..=marks.len() as i64)
        .map(|id| Participant {
            id,
            rider_name: format!("Rider {id}"),
            horse_name: format!("Horse {id}"),
        })
        .collect();
    let evaluations = marks
        .iter()
        .enumerate()
        .map(|(i, m)| Evaluation {
            judge_id: 1,
            participant_id: i as i64 + 1,
            completed: true,
            scores: parameters
                .iter()
                .zip(m)
                .map(|(p, &half_points)| ParameterScore {
                    parameter_id: p.id,
                    raw_score: Score::from_hundredths(i64::from(half_points) * 50),
                    coefficient: p.coefficient,
                })
                .collect(),
        })
        .collect();

    ScoringInput {
        competition: CompetitionInfo {
            id: 1,
            name: "Property".to_string(),
            is_public: true,
            judge_ids: vec![1],
        },
        parameters,
        participants,
        evaluations,
    }
}

proptest! {
    #[test]
    fn test_positions_are_a_permutation(marks in marks_strategy(), method in tie_break_strategy()) {
        let standings = ScoreAggregator::default().aggregate(KEY, &input(&marks));
        let resolved = TieResolver::new(method).resolve(standings);
        let entries = SnapshotManager::build_entries(None, resolved);

        let positions: Vec<u32> = entries.iter().map(|e| e.position).collect();
        let expected: Vec<u32> = (1..=marks.len() as u32).collect();
        prop_assert_eq!(positions, expected);

        let ids: BTreeSet<i64> = entries.iter().map(|e| e.participant_id).collect();
        prop_assert_eq!(ids.len(), marks.len());
    }

    #[test]
    fn test_totals_never_increase_down_the_ranking(marks in marks_strategy(), method in tie_break_strategy()) {
        let standings = ScoreAggregator::default().aggregate(KEY, &input(&marks));
        let resolved = TieResolver::new(method).resolve(standings);

        for pair in resolved.windows(2) {
            prop_assert!(pair[0].total_score >= pair[1].total_score);
        }
    }

    #[test]
    fn test_ties_are_symmetric(marks in marks_strategy(), method in tie_break_strategy()) {
        let standings = ScoreAggregator::default().aggregate(KEY, &input(&marks));
        let resolved = TieResolver::new(method).resolve(standings);

        for standing in &resolved {
            prop_assert_eq!(standing.is_tied, !standing.tied_with.is_empty());
            prop_assert!(!standing.tied_with.contains(&standing.participant_id));
            for peer_id in &standing.tied_with {
                let peer = resolved.iter().find(|s| s.participant_id == *peer_id).unwrap();
                prop_assert!(peer.tied_with.contains(&standing.participant_id));
                prop_assert_eq!(peer.total_score, standing.total_score);
            }
        }
    }

    #[test]
    fn test_resolution_is_deterministic(marks in marks_strategy(), method in tie_break_strategy()) {
        let aggregator = ScoreAggregator::default();
        let first = TieResolver::new(method).resolve(aggregator.aggregate(KEY, &input(&marks)));
        let second = TieResolver::new(method).resolve(aggregator.aggregate(KEY, &input(&marks)));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_changes_match_position_differences(
        before in marks_strategy(),
        after_seed in any::<u64>(),
    ) {
        let aggregator = ScoreAggregator::default();
        let resolver = TieResolver::new(TieBreakMethod::Percentage);
        let prior_entries =
            SnapshotManager::build_entries(None, resolver.resolve(aggregator.aggregate(KEY, &input(&before))));

        // Rotate the marks so the same participants are ranked differently
        let mut after = before.clone();
        let shift = (after_seed % after.len() as u64) as usize;
        after.rotate_left(shift);

        let prior = live_ranking::ranking::RankingView {
            snapshot: live_ranking::ranking::RankingSnapshot {
                id: 1,
                competition_id: 1,
                category_id: 1,
                created_at: chrono::Utc::now(),
                total_participants: prior_entries.len() as u32,
                completed_evaluations: 0,
                total_evaluations: 0,
                progress_percentage: 0.0,
                is_current: true,
                is_final: false,
            },
            entries: prior_entries,
        };
        let entries = SnapshotManager::build_entries(
            Some(&prior),
            resolver.resolve(aggregator.aggregate(KEY, &input(&after))),
        );
        let changes = ChangeDetector::diff(Some(&prior), &entries);

        for entry in &entries {
            let old = prior.position_of(entry.participant_id).unwrap();
            prop_assert_eq!(entry.previous_position, Some(old));
            prop_assert_eq!(entry.position_change, old as i32 - entry.position as i32);

            let change = changes.iter().find(|c| c.participant_id == entry.participant_id);
            if old == entry.position {
                prop_assert!(change.is_none());
            } else {
                let change = change.unwrap();
                prop_assert_eq!(change.change, old as i32 - entry.position as i32);
            }
        }
        for pair in changes.windows(2) {
            prop_assert!(pair[0].new_position < pair[1].new_position);
        }
    }
}
