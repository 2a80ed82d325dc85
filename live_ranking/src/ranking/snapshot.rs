//! Snapshot construction, commit and reads.

use super::errors::RankingResult;
use super::models::{
    CalculationId, CalculationSuccess, NewSnapshot, RankingEntry, RankingSnapshot, RankingView,
    SnapshotId,
};
use crate::db::RankingRepository;
use crate::scoring::{ProgressStats, RankingKey, Standing};
use std::sync::Arc;

/// Default page size of snapshot history
pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Largest page size of snapshot history
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Clamp a caller-supplied history limit to `1..=100`, defaulting to 20.
pub fn clamp_history_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

/// Owns the snapshot lifecycle of every key.
#[derive(Clone)]
pub struct SnapshotManager {
    repository: Arc<dyn RankingRepository>,
}

impl SnapshotManager {
    pub fn new(repository: Arc<dyn RankingRepository>) -> Self {
        Self { repository }
    }

    /// Number resolved standings 1..N and carry positions over from `prior`.
    pub fn build_entries(prior: Option<&RankingView>, standings: Vec<Standing>) -> Vec<RankingEntry> {
        standings
            .into_iter()
            .enumerate()
            .map(|(index, standing)| {
                let position = index as u32 + 1;
                let previous_position =
                    prior.and_then(|view| view.position_of(standing.participant_id));
                let position_change = previous_position
                    .map(|previous| previous as i32 - position as i32)
                    .unwrap_or(0);

                RankingEntry {
                    participant_id: standing.participant_id,
                    rider_name: standing.rider_name,
                    horse_name: standing.horse_name,
                    position,
                    previous_position,
                    position_change,
                    total_score: standing.total_score,
                    percentage_score: standing.percentage_score,
                    judge_scores: standing.judge_scores,
                    evaluations_completed: standing.evaluations_completed,
                    evaluations_total: standing.evaluations_total,
                    is_tied: standing.is_tied,
                    tied_with: standing.tied_with,
                }
            })
            .collect()
    }

    /// Snapshot metadata from the key's progress.
    pub fn new_snapshot(key: RankingKey, progress: &ProgressStats) -> NewSnapshot {
        NewSnapshot {
            key,
            total_participants: progress.total_participants,
            completed_evaluations: progress.completed_evaluations,
            total_evaluations: progress.total_evaluations,
            progress_percentage: progress.progress_percentage,
            is_final: progress.is_complete(),
        }
    }

    /// Supersede the current snapshot and store the new one, all or nothing.
    pub async fn commit(
        &self,
        calculation_id: CalculationId,
        snapshot: &NewSnapshot,
        entries: &[RankingEntry],
        success: &CalculationSuccess,
    ) -> RankingResult<RankingView> {
        let view = self
            .repository
            .commit_snapshot(calculation_id, snapshot, entries, success)
            .await?;
        log::debug!(
            "Committed snapshot {} for {} with {} entries",
            view.snapshot.id,
            snapshot.key,
            entries.len()
        );
        Ok(view)
    }

    pub async fn current(&self, key: RankingKey) -> RankingResult<Option<RankingView>> {
        self.repository.current_snapshot(key).await
    }

    pub async fn snapshot(&self, id: SnapshotId) -> RankingResult<Option<RankingView>> {
        self.repository.snapshot(id).await
    }

    /// Most recent first
    pub async fn history(
        &self,
        key: RankingKey,
        limit: Option<u32>,
    ) -> RankingResult<Vec<RankingSnapshot>> {
        self.repository
            .snapshot_history(key, clamp_history_limit(limit))
            .await
    }
}
