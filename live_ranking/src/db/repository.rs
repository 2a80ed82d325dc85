//! Repository trait definitions for testability and dependency injection.
//!
//! `CompetitionDirectory` is the read-only view of the collaborating
//! registration, competition and evaluation subsystems. `RankingRepository`
//! owns the engine's own records: configurations, snapshots, calculations
//! and live updates. Both have a PostgreSQL implementation and an in-memory
//! one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::broadcast::{LiveRankingUpdate, NewLiveUpdate, UpdateId};
use crate::config::RankingConfiguration;
use crate::ranking::{
    CalculationId, CalculationSuccess, NewSnapshot, RankingCalculation, RankingEntry,
    RankingResult, RankingSnapshot, RankingView, SnapshotId,
};
use crate::scoring::{
    CategoryId, CompetitionId, CompetitionInfo, Evaluation, JudgeId, Participant, RankingKey,
    ScoringParameter,
};

/// Read access to the competition, registration and evaluation subsystems
#[async_trait]
pub trait CompetitionDirectory: Send + Sync {
    /// Competition metadata including assigned judges
    async fn competition(&self, id: CompetitionId) -> RankingResult<Option<CompetitionInfo>>;

    /// Judged parameters of a category with their coefficients
    async fn category_parameters(
        &self,
        category_id: CategoryId,
    ) -> RankingResult<Vec<ScoringParameter>>;

    /// Confirmed participants of a key
    async fn confirmed_participants(&self, key: RankingKey) -> RankingResult<Vec<Participant>>;

    /// All judge evaluations of a key, completed or not
    async fn evaluations(&self, key: RankingKey) -> RankingResult<Vec<Evaluation>>;

    /// Whether `judge_id` is assigned to the competition
    async fn is_judge_assigned(
        &self,
        judge_id: JudgeId,
        competition_id: CompetitionId,
    ) -> RankingResult<bool>;
}

/// Storage of the engine's own records
#[async_trait]
pub trait RankingRepository: Send + Sync {
    /// Stored configuration of a key
    async fn get_configuration(&self, key: RankingKey)
    -> RankingResult<Option<RankingConfiguration>>;

    /// Insert `config` unless one exists for its key; return whichever is stored
    async fn insert_configuration_if_absent(
        &self,
        config: &RankingConfiguration,
    ) -> RankingResult<RankingConfiguration>;

    /// Overwrite the configuration of a key
    async fn save_configuration(&self, config: &RankingConfiguration) -> RankingResult<()>;

    /// Every stored configuration
    async fn list_configurations(&self) -> RankingResult<Vec<RankingConfiguration>>;

    /// Create a running calculation record
    async fn begin_calculation(
        &self,
        key: RankingKey,
        started_at: DateTime<Utc>,
    ) -> RankingResult<RankingCalculation>;

    /// Atomically: supersede the current snapshot of the key, insert the new
    /// snapshot with its entries, and mark the calculation succeeded.
    ///
    /// Fails with `CalculationAlreadyCompleted` (and changes nothing) when
    /// the calculation is not running.
    async fn commit_snapshot(
        &self,
        calculation_id: CalculationId,
        snapshot: &NewSnapshot,
        entries: &[RankingEntry],
        success: &CalculationSuccess,
    ) -> RankingResult<RankingView>;

    /// Mark a running calculation failed
    async fn fail_calculation(
        &self,
        calculation_id: CalculationId,
        error: &str,
        completed_at: DateTime<Utc>,
    ) -> RankingResult<()>;

    /// Calculation record by id
    async fn calculation(&self, id: CalculationId) -> RankingResult<Option<RankingCalculation>>;

    /// Most recent successful calculation of a key (by start time)
    async fn last_successful_calculation(
        &self,
        key: RankingKey,
    ) -> RankingResult<Option<RankingCalculation>>;

    /// Current snapshot of a key with its entries
    async fn current_snapshot(&self, key: RankingKey) -> RankingResult<Option<RankingView>>;

    /// Snapshot by id with its entries
    async fn snapshot(&self, id: SnapshotId) -> RankingResult<Option<RankingView>>;

    /// Snapshots of a key, most recent first
    async fn snapshot_history(
        &self,
        key: RankingKey,
        limit: u32,
    ) -> RankingResult<Vec<RankingSnapshot>>;

    /// Queue a live update
    async fn enqueue_update(&self, update: &NewLiveUpdate) -> RankingResult<LiveRankingUpdate>;

    /// Updates still `broadcasted = false` with fewer than `max_attempts`
    /// failed attempts, oldest first
    async fn pending_updates(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> RankingResult<Vec<LiveRankingUpdate>>;

    /// Flip `broadcasted` to true if it is still false.
    ///
    /// Returns whether this call performed the flip.
    async fn mark_broadcasted(&self, id: UpdateId, at: DateTime<Utc>) -> RankingResult<bool>;

    /// Count a failed delivery attempt
    async fn record_broadcast_failure(&self, id: UpdateId, error: &str) -> RankingResult<()>;

    /// Update record by id
    async fn update(&self, id: UpdateId) -> RankingResult<Option<LiveRankingUpdate>>;

    /// Check that the store is reachable
    async fn health_check(&self) -> RankingResult<()>;
}
