//! Score aggregation module.
//!
//! This module turns per-judge, per-parameter raw marks into ranked standings:
//! - Weighted evaluation totals (`raw × coefficient`)
//! - Participant totals over completed evaluations only
//! - Percentages against a cached maximum possible score
//! - Evaluation progress statistics
//!
//! ## Example
//!
//! ```
//! use live_ranking::scoring::{RankingKey, ScoreAggregator, ScoringParameter};
//!
//! let aggregator = ScoreAggregator::default();
//! let parameters = vec![ScoringParameter { id: 1, name: "Halt".into(), coefficient: 2 }];
//!
//! // 10 × 2 per judge, three judges
//! let max = aggregator.max_possible_score(RankingKey::new(1, 1), &parameters, 3);
//! assert_eq!(max.to_string(), "60.00");
//! ```

pub mod aggregator;
pub mod cache;
pub mod models;

pub use aggregator::ScoreAggregator;
pub use cache::{DEFAULT_MAX_SCORE_TTL, MaxScoreCache};
pub use models::{
    CategoryId, CompetitionId, CompetitionInfo, Evaluation, JudgeBreakdown, JudgeId,
    JudgeProgress, MAX_RAW_SCORE, ParameterId, ParameterScore, Participant, ParticipantId,
    ProgressStats, RankingKey, Score, ScoringInput, ScoringParameter, Standing,
    TECHNICAL_COEFFICIENTS,
};
