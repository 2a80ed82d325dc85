//! Ranking pipeline coordinator.

use super::detector::ChangeDetector;
use super::errors::{RankingError, RankingResult};
use super::locks::KeyedLocks;
use super::models::{
    CalculationId, CalculationSuccess, PositionChange, RankingCalculation, RankingSnapshot,
    RankingView, RecomputeOutcome,
};
use super::snapshot::SnapshotManager;
use super::tie_break::TieResolver;
use crate::auth::Viewer;
use crate::broadcast::{
    BroadcastDispatcher, BroadcastResult, DEFAULT_MAX_ATTEMPTS, Dispatch, SweepReport,
    UpdatePublisher,
};
use crate::config::{ConfigurationStore, RankingConfigUpdate, RankingConfiguration};
use crate::db::{CompetitionDirectory, RankingRepository};
use crate::scoring::{
    CompetitionInfo, DEFAULT_MAX_SCORE_TTL, ProgressStats, RankingKey, ScoreAggregator,
    ScoringInput,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Engine tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Lifetime of cached maximum possible scores
    pub max_score_ttl: Duration,
    /// Failed deliveries after which an update is given up on
    pub broadcast_max_attempts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_score_ttl: DEFAULT_MAX_SCORE_TTL,
            broadcast_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl EngineSettings {
    /// Read settings from the environment, falling back to defaults for
    /// unset or unparsable values.
    ///
    /// - `MAX_SCORE_CACHE_TTL_SECS` (default: 3600)
    /// - `BROADCAST_MAX_ATTEMPTS` (default: 20)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_score_ttl: env::var("MAX_SCORE_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_score_ttl),
            broadcast_max_attempts: env::var("BROADCAST_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.broadcast_max_attempts),
        }
    }
}

/// Result of one auto-calculation sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoCalculationReport {
    /// Configurations with auto-calculation enabled
    pub checked: usize,
    /// Keys recomputed successfully
    pub recomputed: usize,
    /// Keys whose recomputation failed
    pub failed: usize,
}

/// Runs aggregate → resolve → snapshot → detect → enqueue for one key at a
/// time and serves the resulting rankings.
///
/// Read paths never store configurations; a key gets a stored configuration
/// only through [`recompute`](Self::recompute) or the configuration calls.
pub struct RankingEngine {
    directory: Arc<dyn CompetitionDirectory>,
    repository: Arc<dyn RankingRepository>,
    configurations: ConfigurationStore,
    aggregator: ScoreAggregator,
    snapshots: SnapshotManager,
    dispatcher: BroadcastDispatcher,
    locks: KeyedLocks,
}

impl RankingEngine {
    pub fn new(
        directory: Arc<dyn CompetitionDirectory>,
        repository: Arc<dyn RankingRepository>,
        publisher: Arc<dyn UpdatePublisher>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            configurations: ConfigurationStore::new(Arc::clone(&repository)),
            aggregator: ScoreAggregator::new(settings.max_score_ttl),
            snapshots: SnapshotManager::new(Arc::clone(&repository)),
            dispatcher: BroadcastDispatcher::new(
                Arc::clone(&repository),
                publisher,
                settings.broadcast_max_attempts,
            ),
            locks: KeyedLocks::new(),
            directory,
            repository,
        }
    }

    pub fn directory(&self) -> &dyn CompetitionDirectory {
        self.directory.as_ref()
    }

    pub fn configurations(&self) -> &ConfigurationStore {
        &self.configurations
    }

    pub fn dispatcher(&self) -> &BroadcastDispatcher {
        &self.dispatcher
    }

    /// Force a recomputation of `key`.
    ///
    /// Writes exactly one calculation record once the competition is known.
    /// On failure the record is marked failed and the previous snapshot stays
    /// current. Broadcast problems are logged and never fail the call.
    pub async fn recompute(&self, key: RankingKey) -> RankingResult<RecomputeOutcome> {
        let (outcome, config, update) = {
            let _guard = self.locks.acquire(key).await;

            let competition = self.competition(key).await?;
            let config = self.configurations.get_or_create(key).await?;
            let calculation = self.repository.begin_calculation(key, Utc::now()).await?;

            let (ranking, changes) = match self
                .run_pipeline(key, competition, &config, calculation.id)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    log::error!("Ranking calculation {} for {key} failed: {e}", calculation.id);
                    if let Err(fail_err) = self
                        .repository
                        .fail_calculation(calculation.id, &e.to_string(), Utc::now())
                        .await
                    {
                        log::error!(
                            "Could not mark calculation {} as failed: {fail_err}",
                            calculation.id
                        );
                    }
                    return Err(e);
                }
            };

            let update = if config.broadcast_enabled {
                match self
                    .dispatcher
                    .enqueue(key, ranking.snapshot.id, &changes)
                    .await
                {
                    Ok(update) => update,
                    Err(e) => {
                        log::warn!("Could not queue live update for {key}: {e}");
                        None
                    }
                }
            } else {
                None
            };

            log::info!(
                "Ranking calculation {} for {key}: snapshot {}, {} participants, {} moved",
                calculation.id,
                ranking.snapshot.id,
                ranking.entries.len(),
                changes.len()
            );

            (
                RecomputeOutcome {
                    calculation_id: calculation.id,
                    update_id: update.as_ref().map(|u| u.id),
                    ranking,
                    changes,
                },
                config,
                update,
            )
        };

        if let Some(update) = update {
            let interval = Duration::from_secs(u64::from(config.broadcast_interval));
            match self.dispatcher.dispatch_throttled(&update, interval).await {
                Ok(Dispatch::Throttled) => {
                    log::debug!("Update {} for {key} left for the broadcast sweep", update.id);
                }
                Ok(_) => {}
                Err(e) => log::warn!("Immediate broadcast of update {} failed: {e}", update.id),
            }
        }

        Ok(outcome)
    }

    async fn run_pipeline(
        &self,
        key: RankingKey,
        competition: CompetitionInfo,
        config: &RankingConfiguration,
        calculation_id: CalculationId,
    ) -> RankingResult<(RankingView, Vec<PositionChange>)> {
        let input = self.load_input(key, competition).await?;

        let standings = self.aggregator.aggregate(key, &input);
        let progress = ScoreAggregator::progress(&input);
        let resolved = TieResolver::new(config.tie_break_method).resolve(standings);

        // Under the key lock, the current snapshot is the one about to be superseded.
        let prior = self.snapshots.current(key).await?;
        let entries = SnapshotManager::build_entries(prior.as_ref(), resolved);
        let changes = ChangeDetector::diff(prior.as_ref(), &entries);

        let success = CalculationSuccess {
            participants_processed: entries.len() as u32,
            changes: changes.clone(),
            completed_at: Utc::now(),
        };
        let ranking = self
            .snapshots
            .commit(
                calculation_id,
                &SnapshotManager::new_snapshot(key, &progress),
                &entries,
                &success,
            )
            .await?;

        Ok((ranking, changes))
    }

    async fn load_input(
        &self,
        key: RankingKey,
        competition: CompetitionInfo,
    ) -> RankingResult<ScoringInput> {
        Ok(ScoringInput {
            parameters: self.directory.category_parameters(key.category_id).await?,
            participants: self.directory.confirmed_participants(key).await?,
            evaluations: self.directory.evaluations(key).await?,
            competition,
        })
    }

    async fn competition(&self, key: RankingKey) -> RankingResult<CompetitionInfo> {
        self.directory
            .competition(key.competition_id)
            .await?
            .ok_or(RankingError::CompetitionNotFound(key.competition_id))
    }

    /// Debounced trigger for score changes: recompute only when the key's
    /// configuration allows it now.
    pub async fn notify_scores_changed(
        &self,
        key: RankingKey,
    ) -> RankingResult<Option<RecomputeOutcome>> {
        if !self
            .configurations
            .should_recalculate(key, Utc::now())
            .await?
        {
            log::debug!("Score change for {key} debounced");
            return Ok(None);
        }
        self.recompute(key).await.map(Some)
    }

    /// Recompute every auto-calculated key whose interval has elapsed.
    ///
    /// A failing key is logged and does not stop the sweep.
    pub async fn run_auto_calculation_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> RankingResult<AutoCalculationReport> {
        let mut report = AutoCalculationReport::default();

        for config in self.configurations.list().await? {
            if !config.auto_calculate {
                continue;
            }
            report.checked += 1;
            let key = config.key();

            let due = match self.configurations.should_recalculate(key, now).await {
                Ok(due) => due,
                Err(e) => {
                    log::error!("Auto-calculation check for {key} failed: {e}");
                    report.failed += 1;
                    continue;
                }
            };
            if !due {
                continue;
            }

            match self.recompute(key).await {
                Ok(_) => report.recomputed += 1,
                Err(e) => {
                    log::error!("Auto-calculation for {key} failed: {e}");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Re-attempt undelivered live updates
    pub async fn broadcast_pending(&self) -> BroadcastResult<SweepReport> {
        self.dispatcher.broadcast_pending().await
    }

    /// Current snapshot with entries, unfiltered
    pub async fn current_ranking(&self, key: RankingKey) -> RankingResult<Option<RankingView>> {
        self.snapshots.current(key).await
    }

    /// Current snapshot as `viewer` may see it.
    ///
    /// Staff and organizers get the full ranking; everyone else gets it with
    /// the key's display toggles applied.
    pub async fn ranking_for(
        &self,
        key: RankingKey,
        viewer: &Viewer,
    ) -> RankingResult<Option<RankingView>> {
        let Some(ranking) = self.snapshots.current(key).await? else {
            return Ok(None);
        };
        if viewer.is_manager() {
            return Ok(Some(ranking));
        }
        let config = self.configurations.get_or_default(key).await?;
        Ok(Some(ranking.for_display(&config)))
    }

    /// Snapshot metadata, most recent first. `limit` is clamped to 1..=100.
    pub async fn ranking_history(
        &self,
        key: RankingKey,
        limit: Option<u32>,
    ) -> RankingResult<Vec<RankingSnapshot>> {
        self.snapshots.history(key, limit).await
    }

    /// Live evaluation progress, read from the evaluation subsystem
    pub async fn progress(&self, key: RankingKey) -> RankingResult<ProgressStats> {
        let competition = self.competition(key).await?;
        let input = self.load_input(key, competition).await?;
        Ok(ScoreAggregator::progress(&input))
    }

    /// Progress as `viewer` may see it; hidden when the key does not
    /// publish progress and the viewer is not staff.
    pub async fn progress_for(&self, key: RankingKey, viewer: &Viewer) -> RankingResult<ProgressStats> {
        if !viewer.is_manager() && !self.configurations.get_or_default(key).await?.show_progress {
            return Err(RankingError::Forbidden(
                "progress is not published for this ranking".to_string(),
            ));
        }
        self.progress(key).await
    }

    /// Stored configuration, created with defaults on first reference
    pub async fn configuration(&self, key: RankingKey) -> RankingResult<RankingConfiguration> {
        self.configurations.get_or_create(key).await
    }

    /// Configuration governing what non-staff viewers see; never stored
    pub async fn display_configuration(
        &self,
        key: RankingKey,
    ) -> RankingResult<RankingConfiguration> {
        self.configurations.get_or_default(key).await
    }

    pub async fn update_configuration(
        &self,
        key: RankingKey,
        update: &RankingConfigUpdate,
    ) -> RankingResult<RankingConfiguration> {
        self.configurations.update(key, update).await
    }

    pub async fn calculation(&self, id: CalculationId) -> RankingResult<Option<RankingCalculation>> {
        self.repository.calculation(id).await
    }

    /// Drop cached maximum scores, e.g. after judges or parameters change
    pub fn clear_score_cache(&self) {
        self.aggregator.clear_cache();
    }

    /// Check that the ranking store is reachable
    pub async fn health_check(&self) -> RankingResult<()> {
        self.repository.health_check().await
    }
}
