//! Ranking snapshot, entry and calculation models.

use crate::config::RankingConfiguration;
use crate::scoring::{JudgeBreakdown, JudgeId, ParticipantId, RankingKey, Score};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Snapshot ID type
pub type SnapshotId = i64;

/// Calculation ID type
pub type CalculationId = i64;

/// Immutable, timestamped ranking for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub id: SnapshotId,
    pub competition_id: i64,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
    pub total_participants: u32,
    pub completed_evaluations: u32,
    pub total_evaluations: u32,
    pub progress_percentage: f64,
    pub is_current: bool,
    pub is_final: bool,
}

impl RankingSnapshot {
    pub fn key(&self) -> RankingKey {
        RankingKey::new(self.competition_id, self.category_id)
    }
}

/// Snapshot metadata before the repository assigns an id and timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub key: RankingKey,
    pub total_participants: u32,
    pub completed_evaluations: u32,
    pub total_evaluations: u32,
    pub progress_percentage: f64,
    pub is_final: bool,
}

/// One participant's line in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub participant_id: ParticipantId,
    pub rider_name: String,
    pub horse_name: String,
    /// 1-based, strictly sequential within the snapshot
    pub position: u32,
    /// Position in the snapshot this one superseded
    pub previous_position: Option<u32>,
    /// `previous_position - position`; positive means moved up
    pub position_change: i32,
    pub total_score: Score,
    pub percentage_score: f64,
    pub judge_scores: BTreeMap<JudgeId, JudgeBreakdown>,
    pub evaluations_completed: u32,
    pub evaluations_total: u32,
    pub is_tied: bool,
    pub tied_with: Vec<ParticipantId>,
}

/// A snapshot together with its ordered entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingView {
    pub snapshot: RankingSnapshot,
    pub entries: Vec<RankingEntry>,
}

impl RankingView {
    pub fn position_of(&self, participant_id: ParticipantId) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.participant_id == participant_id)
            .map(|e| e.position)
    }

    /// Public rendition of the ranking: hidden sections are blanked per the
    /// key's display toggles. Positions, totals and tie flags always remain.
    pub fn for_display(mut self, config: &RankingConfiguration) -> Self {
        if !config.show_progress {
            self.snapshot.completed_evaluations = 0;
            self.snapshot.total_evaluations = 0;
            self.snapshot.progress_percentage = 0.0;
        }

        for entry in &mut self.entries {
            if !config.show_judge_breakdown {
                entry.judge_scores.clear();
            }
            if !config.show_percentages {
                entry.percentage_score = 0.0;
                for breakdown in entry.judge_scores.values_mut() {
                    breakdown.percentage = 0.0;
                }
            }
            if !config.show_progress {
                entry.evaluations_completed = 0;
                entry.evaluations_total = 0;
            }
            if !config.show_position_changes {
                entry.previous_position = None;
                entry.position_change = 0;
            }
        }
        self
    }
}

/// Detected rank movement of one participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionChange {
    pub participant_id: ParticipantId,
    pub rider_name: String,
    pub horse_name: String,
    pub old_position: u32,
    pub new_position: u32,
    /// `old_position - new_position`; positive means moved up
    pub change: i32,
}

/// Lifecycle of a calculation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationStatus {
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculationStatus::Running => write!(f, "running"),
            CalculationStatus::Succeeded => write!(f, "succeeded"),
            CalculationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl CalculationStatus {
    pub fn from_db(value: &str) -> Self {
        match value {
            "succeeded" => CalculationStatus::Succeeded,
            "failed" => CalculationStatus::Failed,
            _ => CalculationStatus::Running,
        }
    }
}

/// Audit record of one computation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingCalculation {
    pub id: CalculationId,
    pub competition_id: i64,
    pub category_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: CalculationStatus,
    pub error: Option<String>,
    pub participants_processed: u32,
    pub snapshot_id: Option<SnapshotId>,
    pub position_changes: Vec<PositionChange>,
}

impl RankingCalculation {
    pub fn key(&self) -> RankingKey {
        RankingKey::new(self.competition_id, self.category_id)
    }

    pub fn is_successful(&self) -> bool {
        self.status == CalculationStatus::Succeeded
    }
}

/// Success data recorded atomically with the snapshot commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationSuccess {
    pub participants_processed: u32,
    pub changes: Vec<PositionChange>,
    pub completed_at: DateTime<Utc>,
}

/// Result of a forced or triggered recomputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeOutcome {
    pub calculation_id: CalculationId,
    pub ranking: RankingView,
    pub changes: Vec<PositionChange>,
    /// Live update queued for the changes, if any
    pub update_id: Option<i64>,
}
