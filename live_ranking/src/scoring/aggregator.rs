//! Score aggregation: judge evaluations in, score-sorted standings out.

use super::cache::MaxScoreCache;
use super::models::{
    CompetitionInfo, JudgeBreakdown, JudgeProgress, ParticipantId, ProgressStats, RankingKey,
    Score, ScoringInput, ScoringParameter, Standing,
};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

/// Turns raw judge evaluations into weighted totals and percentages.
#[derive(Debug, Default)]
pub struct ScoreAggregator {
    max_scores: MaxScoreCache,
}

impl ScoreAggregator {
    /// Create an aggregator whose maximum-score cache expires after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            max_scores: MaxScoreCache::new(ttl),
        }
    }

    /// `Σ(10 × coefficient)` over the category's parameters, times the
    /// number of assigned judges. Cached per key.
    pub fn max_possible_score(
        &self,
        key: RankingKey,
        parameters: &[ScoringParameter],
        judge_count: u32,
    ) -> Score {
        self.max_scores.get_or_compute(key, Instant::now(), || {
            per_judge_max(parameters).saturating_mul(judge_count)
        })
    }

    /// Drop every cached maximum score.
    pub fn clear_cache(&self) {
        self.max_scores.clear();
    }

    /// Drop the cached maximum score of one key.
    pub fn invalidate(&self, key: RankingKey) {
        self.max_scores.invalidate(key);
    }

    /// Aggregate every confirmed participant of `input`.
    ///
    /// Only completed evaluations contribute to totals. The result is sorted by
    /// `total_score` descending with a stable sort over ascending participant
    /// ids; equal totals are left for the tie resolver.
    pub fn aggregate(&self, key: RankingKey, input: &ScoringInput) -> Vec<Standing> {
        let judge_count = input.competition.judge_count();
        let max_score = self.max_possible_score(key, &input.parameters, judge_count);
        let judge_max = per_judge_max(&input.parameters);

        let mut standings: Vec<Standing> = input
            .participants
            .iter()
            .map(|p| Standing {
                participant_id: p.id,
                rider_name: p.rider_name.clone(),
                horse_name: p.horse_name.clone(),
                total_score: Score::ZERO,
                percentage_score: 0.0,
                collective_marks: Score::ZERO,
                technical_score: Score::ZERO,
                judge_scores: BTreeMap::new(),
                evaluations_completed: 0,
                evaluations_total: judge_count,
                is_tied: false,
                tied_with: Vec::new(),
            })
            .collect();
        standings.sort_by_key(|s| s.participant_id);

        let index: HashMap<ParticipantId, usize> = standings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.participant_id, i))
            .collect();

        for evaluation in &input.evaluations {
            let Some(&i) = index.get(&evaluation.participant_id) else {
                continue;
            };
            let standing = &mut standings[i];
            let weighted = evaluation.weighted_score();

            standing.judge_scores.insert(
                evaluation.judge_id,
                JudgeBreakdown {
                    score: weighted,
                    percentage: weighted.percentage_of(judge_max),
                    completed: evaluation.completed,
                },
            );

            if evaluation.completed {
                standing.evaluations_completed += 1;
                standing.total_score = standing.total_score + weighted;
                standing.collective_marks =
                    standing.collective_marks + evaluation.collective_marks();
                standing.technical_score = standing.technical_score + evaluation.technical_score();
            }
        }

        for standing in &mut standings {
            standing.percentage_score = standing.total_score.percentage_of(max_score);
        }

        standings.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        standings
    }

    /// Completion statistics for `input`.
    pub fn progress(input: &ScoringInput) -> ProgressStats {
        progress_for(&input.competition, input)
    }
}

fn per_judge_max(parameters: &[ScoringParameter]) -> Score {
    parameters.iter().map(ScoringParameter::max_score).sum()
}

fn progress_for(competition: &CompetitionInfo, input: &ScoringInput) -> ProgressStats {
    let judge_count = competition.judge_count();
    let total_participants = input.participants.len() as u32;

    let mut completed_by_participant: HashMap<ParticipantId, u32> =
        input.participants.iter().map(|p| (p.id, 0)).collect();
    let mut completed_by_judge: BTreeMap<i64, u32> =
        competition.judge_ids.iter().map(|j| (*j, 0)).collect();

    for evaluation in input.evaluations.iter().filter(|e| e.completed) {
        let Some(count) = completed_by_participant.get_mut(&evaluation.participant_id) else {
            continue;
        };
        *count += 1;
        if let Some(judge) = completed_by_judge.get_mut(&evaluation.judge_id) {
            *judge += 1;
        }
    }

    let mut fully_evaluated = 0;
    let mut partially_evaluated = 0;
    let mut not_evaluated = 0;
    for completed in completed_by_participant.values() {
        match *completed {
            0 => not_evaluated += 1,
            n if judge_count > 0 && n >= judge_count => fully_evaluated += 1,
            _ => partially_evaluated += 1,
        }
    }

    let completed_evaluations: u32 = completed_by_participant.values().sum();
    let total_evaluations = total_participants * judge_count;
    let progress_percentage = if total_evaluations == 0 {
        0.0
    } else {
        super::models::round2(completed_evaluations as f64 / total_evaluations as f64 * 100.0)
    };

    ProgressStats {
        total_participants,
        fully_evaluated,
        partially_evaluated,
        not_evaluated,
        completed_evaluations,
        total_evaluations,
        progress_percentage,
        judge_progress: completed_by_judge
            .into_iter()
            .map(|(judge_id, completed)| JudgeProgress {
                judge_id,
                completed,
                total: total_participants,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::models::{Evaluation, ParameterScore, Participant};

    const KEY: RankingKey = RankingKey::new(1, 1);

    fn parameters() -> Vec<ScoringParameter> {
        vec![
            ScoringParameter {
                id: 1,
                name: "Halt".to_string(),
                coefficient: 1,
            },
            ScoringParameter {
                id: 2,
                name: "Extended trot".to_string(),
                coefficient: 2,
            },
        ]
    }

    fn evaluation(judge_id: i64, participant_id: i64, marks: [f64; 2], completed: bool) -> Evaluation {
        Evaluation {
            judge_id,
            participant_id,
            completed,
            scores: vec![
                ParameterScore {
                    parameter_id: 1,
                    raw_score: Score::from_f64(marks[0]),
                    coefficient: 1,
                },
                ParameterScore {
                    parameter_id: 2,
                    raw_score: Score::from_f64(marks[1]),
                    coefficient: 2,
                },
            ],
        }
    }

    fn input(evaluations: Vec<Evaluation>) -> ScoringInput {
        ScoringInput {
            competition: CompetitionInfo {
                id: 1,
                name: "Spring Dressage".to_string(),
                is_public: true,
                judge_ids: vec![10, 11],
            },
            parameters: parameters(),
            participants: vec![
                Participant {
                    id: 1,
                    rider_name: "Anna".to_string(),
                    horse_name: "Bolero".to_string(),
                },
                Participant {
                    id: 2,
                    rider_name: "Ben".to_string(),
                    horse_name: "Caspar".to_string(),
                },
            ],
            evaluations,
        }
    }

    #[test]
    fn test_weighted_totals_and_percentages() {
        let aggregator = ScoreAggregator::default();
        let standings = aggregator.aggregate(
            KEY,
            &input(vec![
                evaluation(10, 1, [7.0, 8.0], true),
                evaluation(11, 1, [6.0, 7.5], true),
                evaluation(10, 2, [9.0, 9.0], true),
                evaluation(11, 2, [9.0, 9.0], true),
            ]),
        );

        // max = (10 + 20) * 2 judges = 60
        assert_eq!(standings[0].participant_id, 2);
        assert_eq!(standings[0].total_score, Score::from_f64(54.0));
        assert_eq!(standings[0].percentage_score, 90.0);
        assert_eq!(standings[1].total_score, Score::from_f64(23.0 + 21.0));
        assert_eq!(standings[1].judge_scores[&10].score, Score::from_f64(23.0));
        assert_eq!(standings[1].judge_scores[&10].percentage, 76.67);
    }

    #[test]
    fn test_incomplete_evaluations_do_not_count_toward_total() {
        let aggregator = ScoreAggregator::default();
        let standings = aggregator.aggregate(
            KEY,
            &input(vec![
                evaluation(10, 1, [7.0, 7.0], true),
                evaluation(11, 1, [10.0, 10.0], false),
            ]),
        );

        let anna = standings.iter().find(|s| s.participant_id == 1).unwrap();
        assert_eq!(anna.total_score, Score::from_f64(21.0));
        assert_eq!(anna.evaluations_completed, 1);
        assert_eq!(anna.evaluations_total, 2);
        assert!(!anna.judge_scores[&11].completed);
    }

    #[test]
    fn test_equal_totals_keep_participant_order() {
        let aggregator = ScoreAggregator::default();
        let standings = aggregator.aggregate(
            KEY,
            &input(vec![
                evaluation(10, 2, [5.0, 5.0], true),
                evaluation(10, 1, [5.0, 5.0], true),
            ]),
        );
        assert_eq!(standings[0].participant_id, 1);
        assert_eq!(standings[1].participant_id, 2);
        assert!(!standings[0].is_tied);
    }

    #[test]
    fn test_zero_max_score_gives_zero_percentage() {
        let aggregator = ScoreAggregator::default();
        let mut no_judges = input(vec![evaluation(10, 1, [7.0, 7.0], true)]);
        no_judges.competition.judge_ids.clear();

        let standings = aggregator.aggregate(KEY, &no_judges);
        assert!(standings.iter().all(|s| s.percentage_score == 0.0));
    }

    #[test]
    fn test_max_score_cache_tolerates_staleness_until_cleared() {
        let aggregator = ScoreAggregator::default();
        let params = parameters();
        assert_eq!(
            aggregator.max_possible_score(KEY, &params, 2),
            Score::from_f64(60.0)
        );

        // A changed judge count is not seen until the cache is cleared.
        assert_eq!(
            aggregator.max_possible_score(KEY, &params, 3),
            Score::from_f64(60.0)
        );
        aggregator.clear_cache();
        assert_eq!(
            aggregator.max_possible_score(KEY, &params, 3),
            Score::from_f64(90.0)
        );
    }

    #[test]
    fn test_progress_counts() {
        let stats = ScoreAggregator::progress(&input(vec![
            evaluation(10, 1, [7.0, 7.0], true),
            evaluation(11, 1, [7.0, 7.0], true),
            evaluation(10, 2, [7.0, 7.0], true),
            evaluation(11, 2, [7.0, 7.0], false),
        ]));

        assert_eq!(stats.total_participants, 2);
        assert_eq!(stats.fully_evaluated, 1);
        assert_eq!(stats.partially_evaluated, 1);
        assert_eq!(stats.not_evaluated, 0);
        assert_eq!(stats.completed_evaluations, 3);
        assert_eq!(stats.total_evaluations, 4);
        assert_eq!(stats.progress_percentage, 75.0);
        assert_eq!(
            stats.judge_progress,
            vec![
                JudgeProgress {
                    judge_id: 10,
                    completed: 2,
                    total: 2
                },
                JudgeProgress {
                    judge_id: 11,
                    completed: 1,
                    total: 2
                },
            ]
        );
    }
}
