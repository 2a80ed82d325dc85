//! Ranking configuration data models.

use crate::ranking::errors::{RankingError, RankingResult};
use crate::scoring::RankingKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Allowed auto-calculation interval in seconds
pub const CALCULATION_INTERVAL_RANGE: RangeInclusive<u32> = 10..=300;

/// Allowed broadcast interval in seconds
pub const BROADCAST_INTERVAL_RANGE: RangeInclusive<u32> = 1..=60;

/// Default auto-calculation interval in seconds
pub const DEFAULT_CALCULATION_INTERVAL: u32 = 30;

/// Default broadcast interval in seconds
pub const DEFAULT_BROADCAST_INTERVAL: u32 = 5;

/// Rule used to order participants whose totals are exactly equal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TieBreakMethod {
    /// Higher percentage score first
    #[default]
    Percentage,
    /// Higher sum of marks from parameters with coefficient > 1 first
    CollectiveMarks,
    /// Higher sum of marks from technical parameters first
    TechnicalScore,
}

impl fmt::Display for TieBreakMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreakMethod::Percentage => write!(f, "PERCENTAGE"),
            TieBreakMethod::CollectiveMarks => write!(f, "COLLECTIVE_MARKS"),
            TieBreakMethod::TechnicalScore => write!(f, "TECHNICAL_SCORE"),
        }
    }
}

impl FromStr for TieBreakMethod {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(TieBreakMethod::Percentage),
            "COLLECTIVE_MARKS" => Ok(TieBreakMethod::CollectiveMarks),
            "TECHNICAL_SCORE" => Ok(TieBreakMethod::TechnicalScore),
            other => Err(RankingError::InvalidConfig {
                field: "tie_break_method",
                reason: format!("unknown method {other}"),
            }),
        }
    }
}

/// Per-key ranking tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingConfiguration {
    pub competition_id: i64,
    pub category_id: i64,
    /// Recompute automatically on score changes and periodic sweeps
    pub auto_calculate: bool,
    /// Minimum seconds between automatic recomputations
    pub calculation_interval: u32,
    pub tie_break_method: TieBreakMethod,
    /// Enqueue and push live updates
    pub broadcast_enabled: bool,
    /// Minimum seconds between immediate pushes for the key
    pub broadcast_interval: u32,
    pub show_judge_breakdown: bool,
    pub show_percentages: bool,
    pub show_progress: bool,
    pub show_position_changes: bool,
    pub updated_at: DateTime<Utc>,
}

impl RankingConfiguration {
    /// Defaults used the first time a key is referenced
    pub fn defaults(key: RankingKey, now: DateTime<Utc>) -> Self {
        Self {
            competition_id: key.competition_id,
            category_id: key.category_id,
            auto_calculate: true,
            calculation_interval: DEFAULT_CALCULATION_INTERVAL,
            tie_break_method: TieBreakMethod::Percentage,
            broadcast_enabled: true,
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
            show_judge_breakdown: true,
            show_percentages: true,
            show_progress: true,
            show_position_changes: true,
            updated_at: now,
        }
    }

    pub fn key(&self) -> RankingKey {
        RankingKey::new(self.competition_id, self.category_id)
    }

    /// Check interval bounds
    pub fn validate(&self) -> RankingResult<()> {
        if !CALCULATION_INTERVAL_RANGE.contains(&self.calculation_interval) {
            return Err(RankingError::InvalidConfig {
                field: "calculation_interval",
                reason: format!(
                    "must be between {} and {} seconds, got {}",
                    CALCULATION_INTERVAL_RANGE.start(),
                    CALCULATION_INTERVAL_RANGE.end(),
                    self.calculation_interval
                ),
            });
        }

        if !BROADCAST_INTERVAL_RANGE.contains(&self.broadcast_interval) {
            return Err(RankingError::InvalidConfig {
                field: "broadcast_interval",
                reason: format!(
                    "must be between {} and {} seconds, got {}",
                    BROADCAST_INTERVAL_RANGE.start(),
                    BROADCAST_INTERVAL_RANGE.end(),
                    self.broadcast_interval
                ),
            });
        }

        Ok(())
    }

    /// Apply a partial update, returning the validated result without
    /// touching `self`.
    pub fn with_update(&self, update: &RankingConfigUpdate, now: DateTime<Utc>) -> RankingResult<Self> {
        let mut next = self.clone();
        if let Some(v) = update.auto_calculate {
            next.auto_calculate = v;
        }
        if let Some(v) = update.calculation_interval {
            next.calculation_interval = v;
        }
        if let Some(v) = update.tie_break_method {
            next.tie_break_method = v;
        }
        if let Some(v) = update.broadcast_enabled {
            next.broadcast_enabled = v;
        }
        if let Some(v) = update.broadcast_interval {
            next.broadcast_interval = v;
        }
        if let Some(v) = update.show_judge_breakdown {
            next.show_judge_breakdown = v;
        }
        if let Some(v) = update.show_percentages {
            next.show_percentages = v;
        }
        if let Some(v) = update.show_progress {
            next.show_progress = v;
        }
        if let Some(v) = update.show_position_changes {
            next.show_position_changes = v;
        }
        next.validate()?;
        next.updated_at = now;
        Ok(next)
    }

    /// Debounce gate: due when auto-calculation is on and either no
    /// successful calculation exists or the last one started at least
    /// `calculation_interval` seconds ago.
    pub fn is_due(&self, last_success_started: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if !self.auto_calculate {
            return false;
        }
        match last_success_started {
            None => true,
            Some(started) => {
                (now - started).num_seconds() >= i64::from(self.calculation_interval)
            }
        }
    }
}

/// Partial configuration update; `None` fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfigUpdate {
    pub auto_calculate: Option<bool>,
    pub calculation_interval: Option<u32>,
    pub tie_break_method: Option<TieBreakMethod>,
    pub broadcast_enabled: Option<bool>,
    pub broadcast_interval: Option<u32>,
    pub show_judge_breakdown: Option<bool>,
    pub show_percentages: Option<bool>,
    pub show_progress: Option<bool>,
    pub show_position_changes: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> RankingConfiguration {
        RankingConfiguration::defaults(RankingKey::new(1, 2), Utc::now())
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert!(config.auto_calculate);
        assert_eq!(config.calculation_interval, 30);
        assert_eq!(config.tie_break_method, TieBreakMethod::Percentage);
        assert!(config.broadcast_enabled);
        assert_eq!(config.broadcast_interval, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_is_due_debounce() {
        let config = config();
        let now = Utc::now();

        assert!(config.is_due(None, now));
        assert!(!config.is_due(Some(now - Duration::seconds(10)), now));
        assert!(config.is_due(Some(now - Duration::seconds(30)), now));
        assert!(config.is_due(Some(now - Duration::seconds(31)), now));
    }

    #[test]
    fn test_is_due_requires_auto_calculate() {
        let mut config = config();
        config.auto_calculate = false;
        assert!(!config.is_due(None, Utc::now()));
    }

    #[test]
    fn test_update_bounds() {
        let config = config();
        let now = Utc::now();

        let too_fast = RankingConfigUpdate {
            calculation_interval: Some(9),
            ..Default::default()
        };
        assert!(config.with_update(&too_fast, now).is_err());

        let too_slow_broadcast = RankingConfigUpdate {
            broadcast_interval: Some(61),
            ..Default::default()
        };
        assert!(config.with_update(&too_slow_broadcast, now).is_err());

        let edges = RankingConfigUpdate {
            calculation_interval: Some(300),
            broadcast_interval: Some(1),
            tie_break_method: Some(TieBreakMethod::TechnicalScore),
            ..Default::default()
        };
        let updated = config.with_update(&edges, now).unwrap();
        assert_eq!(updated.calculation_interval, 300);
        assert_eq!(updated.broadcast_interval, 1);
        assert_eq!(updated.tie_break_method, TieBreakMethod::TechnicalScore);
        assert!(updated.show_progress);
    }

    #[test]
    fn test_tie_break_method_round_trips_through_strings() {
        for method in [
            TieBreakMethod::Percentage,
            TieBreakMethod::CollectiveMarks,
            TieBreakMethod::TechnicalScore,
        ] {
            assert_eq!(method.to_string().parse::<TieBreakMethod>().unwrap(), method);
        }
        assert!("COIN_FLIP".parse::<TieBreakMethod>().is_err());
        assert_eq!(
            serde_json::to_string(&TieBreakMethod::CollectiveMarks).unwrap(),
            "\"COLLECTIVE_MARKS\""
        );
    }
}
