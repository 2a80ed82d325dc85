//! Scoring data models: identifiers, exact decimal scores, judge evaluations
//! and the per-participant standing produced by aggregation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Competition ID type
pub type CompetitionId = i64;
/// Category ID type
pub type CategoryId = i64;
/// Participant (rider + horse entry) ID type
pub type ParticipantId = i64;
/// Judge ID type (the judge's user ID)
pub type JudgeId = i64;
/// Scoring parameter ID type
pub type ParameterId = i64;

/// Highest raw mark a judge can give for one parameter.
pub const MAX_RAW_SCORE: Score = Score::from_hundredths(1000);

/// Coefficients that mark a parameter as part of the technical score.
pub const TECHNICAL_COEFFICIENTS: [u32; 3] = [3, 4, 5];

/// A (competition, category) pair. Every ranking, configuration and live
/// topic is addressed by one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RankingKey {
    pub competition_id: CompetitionId,
    pub category_id: CategoryId,
}

impl RankingKey {
    pub const fn new(competition_id: CompetitionId, category_id: CategoryId) -> Self {
        Self {
            competition_id,
            category_id,
        }
    }
}

impl fmt::Display for RankingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "competition={} category={}",
            self.competition_id, self.category_id
        )
    }
}

/// Exact decimal score with two fractional digits, stored as hundredths.
///
/// Equality is exact, so two participants tie only when their totals are the
/// same to the hundredth. Serialized as a plain JSON number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", from = "f64")]
pub struct Score(i64);

impl Score {
    pub const ZERO: Score = Score(0);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Round a floating point mark to the nearest hundredth.
    pub fn from_f64(value: f64) -> Self {
        Self((value * 100.0).round() as i64)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Multiply by a parameter coefficient, saturating at the `i64` bounds.
    pub const fn weighted(self, coefficient: u32) -> Self {
        self.saturating_mul(coefficient)
    }

    pub const fn saturating_mul(self, factor: u32) -> Self {
        Self(self.0.saturating_mul(factor as i64))
    }

    /// Percentage of `max`, rounded to two decimals. Zero when `max` is zero.
    pub fn percentage_of(self, max: Score) -> f64 {
        if max.0 == 0 {
            return 0.0;
        }
        round2(self.0 as f64 / max.0 as f64 * 100.0)
    }
}

impl Add for Score {
    type Output = Score;

    /// Saturates at the `i64` bounds.
    fn add(self, rhs: Score) -> Score {
        Score(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Score {
    fn sum<I: Iterator<Item = Score>>(iter: I) -> Score {
        iter.fold(Score::ZERO, Add::add)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> f64 {
        score.as_f64()
    }
}

impl From<f64> for Score {
    fn from(value: f64) -> Score {
        Score::from_f64(value)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A judged parameter of a category (e.g. "Collective: Rider position").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringParameter {
    pub id: ParameterId,
    pub name: String,
    pub coefficient: u32,
}

impl ScoringParameter {
    /// Best weighted score one judge can give for this parameter.
    pub fn max_score(&self) -> Score {
        MAX_RAW_SCORE.weighted(self.coefficient)
    }
}

/// Competition metadata consumed from the competition subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionInfo {
    pub id: CompetitionId,
    pub name: String,
    pub is_public: bool,
    /// Judges assigned to the competition
    pub judge_ids: Vec<JudgeId>,
}

impl CompetitionInfo {
    pub fn judge_count(&self) -> u32 {
        self.judge_ids.len() as u32
    }
}

/// A confirmed participant consumed from the registration subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub rider_name: String,
    pub horse_name: String,
}

/// One raw mark for one parameter within an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterScore {
    pub parameter_id: ParameterId,
    pub raw_score: Score,
    pub coefficient: u32,
}

impl ParameterScore {
    pub fn weighted(&self) -> Score {
        self.raw_score.weighted(self.coefficient)
    }

    pub fn is_collective(&self) -> bool {
        self.coefficient > 1
    }

    pub fn is_technical(&self) -> bool {
        TECHNICAL_COEFFICIENTS.contains(&self.coefficient)
    }
}

/// A single judge's evaluation of a single participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub judge_id: JudgeId,
    pub participant_id: ParticipantId,
    pub completed: bool,
    pub scores: Vec<ParameterScore>,
}

impl Evaluation {
    /// `Σ(raw_score × coefficient)` over all parameters.
    pub fn weighted_score(&self) -> Score {
        self.scores.iter().map(ParameterScore::weighted).sum()
    }

    /// Weighted marks from parameters with a coefficient above one.
    pub fn collective_marks(&self) -> Score {
        self.scores
            .iter()
            .filter(|s| s.is_collective())
            .map(ParameterScore::weighted)
            .sum()
    }

    /// Weighted marks from parameters whose coefficient is in the technical set.
    pub fn technical_score(&self) -> Score {
        self.scores
            .iter()
            .filter(|s| s.is_technical())
            .map(ParameterScore::weighted)
            .sum()
    }
}

/// Everything the aggregator needs for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringInput {
    pub competition: CompetitionInfo,
    pub parameters: Vec<ScoringParameter>,
    pub participants: Vec<Participant>,
    pub evaluations: Vec<Evaluation>,
}

/// One judge's contribution to a participant's total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JudgeBreakdown {
    pub score: Score,
    pub percentage: f64,
    pub completed: bool,
}

/// Aggregated result for one participant, before positions are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub participant_id: ParticipantId,
    pub rider_name: String,
    pub horse_name: String,
    pub total_score: Score,
    pub percentage_score: f64,
    pub collective_marks: Score,
    pub technical_score: Score,
    pub judge_scores: BTreeMap<JudgeId, JudgeBreakdown>,
    pub evaluations_completed: u32,
    pub evaluations_total: u32,
    pub is_tied: bool,
    pub tied_with: Vec<ParticipantId>,
}

/// Completion counts for one judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeProgress {
    pub judge_id: JudgeId,
    pub completed: u32,
    pub total: u32,
}

/// Evaluation progress for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total_participants: u32,
    pub fully_evaluated: u32,
    pub partially_evaluated: u32,
    pub not_evaluated: u32,
    pub completed_evaluations: u32,
    pub total_evaluations: u32,
    pub progress_percentage: f64,
    pub judge_progress: Vec<JudgeProgress>,
}

impl ProgressStats {
    /// True when every expected evaluation is in.
    pub fn is_complete(&self) -> bool {
        self.total_evaluations > 0 && self.completed_evaluations >= self.total_evaluations
    }
}
