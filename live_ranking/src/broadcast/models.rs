//! Live update queue models.

use crate::scoring::{ParticipantId, RankingKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Update ID type
pub type UpdateId = i64;

/// Kind of queued live update.
///
/// Updates are only queued for detected position changes; the type is kept
/// on the wire so clients can filter with `subscribe_updates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Participants moved between snapshots
    PositionChange,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateType::PositionChange => write!(f, "position_change"),
        }
    }
}

impl UpdateType {
    pub fn from_db(value: &str) -> Self {
        if value != "position_change" {
            log::warn!("Unknown live update type {value:?}, reading it as position_change");
        }
        UpdateType::PositionChange
    }
}

/// Queued broadcast event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRankingUpdate {
    pub id: UpdateId,
    pub competition_id: i64,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
    pub update_type: UpdateType,
    pub affected_participants: Vec<ParticipantId>,
    pub payload: serde_json::Value,
    pub broadcasted: bool,
    pub broadcasted_at: Option<DateTime<Utc>>,
    /// Failed delivery attempts so far
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl LiveRankingUpdate {
    pub fn key(&self) -> RankingKey {
        RankingKey::new(self.competition_id, self.category_id)
    }
}

/// Update before the repository assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLiveUpdate {
    pub key: RankingKey,
    pub update_type: UpdateType,
    pub affected_participants: Vec<ParticipantId>,
    pub payload: serde_json::Value,
}

/// Result of one pending-update sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Pending records looked at
    pub attempted: usize,
    /// Records flipped to broadcasted by this sweep
    pub delivered: usize,
    /// Publish attempts that failed and stay pending
    pub failed: usize,
    /// Records skipped because they exhausted their attempts
    pub abandoned: usize,
}
