//! In-memory implementation of both repository traits.
//!
//! Every mutation happens under one write lock, which gives the same
//! all-or-nothing guarantees the PostgreSQL backend gets from transactions.
//! Used by the test suites and by the server's `--in-memory` mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

use super::repository::{CompetitionDirectory, RankingRepository};
use crate::broadcast::{LiveRankingUpdate, NewLiveUpdate, UpdateId};
use crate::config::RankingConfiguration;
use crate::ranking::{
    CalculationId, CalculationStatus, CalculationSuccess, NewSnapshot, RankingCalculation,
    RankingEntry, RankingError, RankingResult, RankingSnapshot, RankingView, SnapshotId,
};
use crate::scoring::{
    CategoryId, CompetitionId, CompetitionInfo, Evaluation, JudgeId, Participant, ParticipantId,
    RankingKey, ScoringParameter,
};

#[derive(Default)]
struct MemoryData {
    competitions: HashMap<CompetitionId, CompetitionInfo>,
    parameters: HashMap<CategoryId, Vec<ScoringParameter>>,
    participants: HashMap<RankingKey, BTreeMap<ParticipantId, Participant>>,
    evaluations: HashMap<RankingKey, BTreeMap<(ParticipantId, JudgeId), Evaluation>>,
    configurations: BTreeMap<RankingKey, RankingConfiguration>,
    snapshots: Vec<RankingView>,
    calculations: Vec<RankingCalculation>,
    updates: Vec<LiveRankingUpdate>,
}

/// In-memory store for competitions, evaluations and ranking records
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a competition
    pub async fn add_competition(&self, competition: CompetitionInfo) {
        let mut data = self.data.write().await;
        data.competitions.insert(competition.id, competition);
    }

    /// Replace the judged parameters of a category
    pub async fn set_parameters(&self, category_id: CategoryId, parameters: Vec<ScoringParameter>) {
        let mut data = self.data.write().await;
        data.parameters.insert(category_id, parameters);
    }

    /// Confirm a participant for a key
    pub async fn add_participant(&self, key: RankingKey, participant: Participant) {
        let mut data = self.data.write().await;
        data.participants
            .entry(key)
            .or_default()
            .insert(participant.id, participant);
    }

    /// Withdraw a participant from a key
    pub async fn remove_participant(&self, key: RankingKey, participant_id: ParticipantId) {
        let mut data = self.data.write().await;
        if let Some(participants) = data.participants.get_mut(&key) {
            participants.remove(&participant_id);
        }
    }

    /// Insert or replace one judge's evaluation of one participant
    pub async fn record_evaluation(&self, key: RankingKey, evaluation: Evaluation) {
        let mut data = self.data.write().await;
        data.evaluations
            .entry(key)
            .or_default()
            .insert((evaluation.participant_id, evaluation.judge_id), evaluation);
    }

    /// Number of snapshots ever committed for a key
    pub async fn snapshot_count(&self, key: RankingKey) -> usize {
        let data = self.data.read().await;
        data.snapshots
            .iter()
            .filter(|v| v.snapshot.key() == key)
            .count()
    }

    /// Number of snapshots currently flagged current for a key
    pub async fn current_snapshot_count(&self, key: RankingKey) -> usize {
        let data = self.data.read().await;
        data.snapshots
            .iter()
            .filter(|v| v.snapshot.key() == key && v.snapshot.is_current)
            .count()
    }

    /// Every calculation record of a key, oldest first
    pub async fn calculations(&self, key: RankingKey) -> Vec<RankingCalculation> {
        let data = self.data.read().await;
        data.calculations
            .iter()
            .filter(|c| c.key() == key)
            .cloned()
            .collect()
    }

    /// Every update record of a key, oldest first
    pub async fn updates(&self, key: RankingKey) -> Vec<LiveRankingUpdate> {
        let data = self.data.read().await;
        data.updates
            .iter()
            .filter(|u| u.key() == key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CompetitionDirectory for MemoryStore {
    async fn competition(&self, id: CompetitionId) -> RankingResult<Option<CompetitionInfo>> {
        Ok(self.data.read().await.competitions.get(&id).cloned())
    }

    async fn category_parameters(
        &self,
        category_id: CategoryId,
    ) -> RankingResult<Vec<ScoringParameter>> {
        Ok(self
            .data
            .read()
            .await
            .parameters
            .get(&category_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn confirmed_participants(&self, key: RankingKey) -> RankingResult<Vec<Participant>> {
        Ok(self
            .data
            .read()
            .await
            .participants
            .get(&key)
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn evaluations(&self, key: RankingKey) -> RankingResult<Vec<Evaluation>> {
        Ok(self
            .data
            .read()
            .await
            .evaluations
            .get(&key)
            .map(|e| e.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn is_judge_assigned(
        &self,
        judge_id: JudgeId,
        competition_id: CompetitionId,
    ) -> RankingResult<bool> {
        Ok(self
            .data
            .read()
            .await
            .competitions
            .get(&competition_id)
            .is_some_and(|c| c.judge_ids.contains(&judge_id)))
    }
}

#[async_trait]
impl RankingRepository for MemoryStore {
    async fn get_configuration(
        &self,
        key: RankingKey,
    ) -> RankingResult<Option<RankingConfiguration>> {
        Ok(self.data.read().await.configurations.get(&key).cloned())
    }

    async fn insert_configuration_if_absent(
        &self,
        config: &RankingConfiguration,
    ) -> RankingResult<RankingConfiguration> {
        let mut data = self.data.write().await;
        Ok(data
            .configurations
            .entry(config.key())
            .or_insert_with(|| config.clone())
            .clone())
    }

    async fn save_configuration(&self, config: &RankingConfiguration) -> RankingResult<()> {
        let mut data = self.data.write().await;
        data.configurations.insert(config.key(), config.clone());
        Ok(())
    }

    async fn list_configurations(&self) -> RankingResult<Vec<RankingConfiguration>> {
        Ok(self
            .data
            .read()
            .await
            .configurations
            .values()
            .cloned()
            .collect())
    }

    async fn begin_calculation(
        &self,
        key: RankingKey,
        started_at: DateTime<Utc>,
    ) -> RankingResult<RankingCalculation> {
        let mut data = self.data.write().await;
        let calculation = RankingCalculation {
            id: data.calculations.len() as CalculationId + 1,
            competition_id: key.competition_id,
            category_id: key.category_id,
            started_at,
            completed_at: None,
            duration_ms: None,
            status: CalculationStatus::Running,
            error: None,
            participants_processed: 0,
            snapshot_id: None,
            position_changes: Vec::new(),
        };
        data.calculations.push(calculation.clone());
        Ok(calculation)
    }

    async fn commit_snapshot(
        &self,
        calculation_id: CalculationId,
        snapshot: &NewSnapshot,
        entries: &[RankingEntry],
        success: &CalculationSuccess,
    ) -> RankingResult<RankingView> {
        let mut data = self.data.write().await;

        // Validate before mutating anything.
        let calculation_index = data
            .calculations
            .iter()
            .position(|c| c.id == calculation_id && c.status == CalculationStatus::Running)
            .ok_or(RankingError::CalculationAlreadyCompleted(calculation_id))?;

        for view in data
            .snapshots
            .iter_mut()
            .filter(|v| v.snapshot.key() == snapshot.key && v.snapshot.is_current)
        {
            view.snapshot.is_current = false;
        }

        let id = data.snapshots.len() as SnapshotId + 1;
        let view = RankingView {
            snapshot: RankingSnapshot {
                id,
                competition_id: snapshot.key.competition_id,
                category_id: snapshot.key.category_id,
                created_at: success.completed_at,
                total_participants: snapshot.total_participants,
                completed_evaluations: snapshot.completed_evaluations,
                total_evaluations: snapshot.total_evaluations,
                progress_percentage: snapshot.progress_percentage,
                is_current: true,
                is_final: snapshot.is_final,
            },
            entries: entries.to_vec(),
        };
        data.snapshots.push(view.clone());

        let calculation = &mut data.calculations[calculation_index];
        calculation.status = CalculationStatus::Succeeded;
        calculation.completed_at = Some(success.completed_at);
        calculation.duration_ms =
            Some((success.completed_at - calculation.started_at).num_milliseconds());
        calculation.participants_processed = success.participants_processed;
        calculation.snapshot_id = Some(id);
        calculation.position_changes = success.changes.clone();

        Ok(view)
    }

    async fn fail_calculation(
        &self,
        calculation_id: CalculationId,
        error: &str,
        completed_at: DateTime<Utc>,
    ) -> RankingResult<()> {
        let mut data = self.data.write().await;
        let calculation = data
            .calculations
            .iter_mut()
            .find(|c| c.id == calculation_id && c.status == CalculationStatus::Running)
            .ok_or(RankingError::CalculationAlreadyCompleted(calculation_id))?;

        calculation.status = CalculationStatus::Failed;
        calculation.error = Some(error.to_string());
        calculation.completed_at = Some(completed_at);
        calculation.duration_ms = Some((completed_at - calculation.started_at).num_milliseconds());
        Ok(())
    }

    async fn calculation(&self, id: CalculationId) -> RankingResult<Option<RankingCalculation>> {
        Ok(self
            .data
            .read()
            .await
            .calculations
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn last_successful_calculation(
        &self,
        key: RankingKey,
    ) -> RankingResult<Option<RankingCalculation>> {
        Ok(self
            .data
            .read()
            .await
            .calculations
            .iter()
            .filter(|c| c.key() == key && c.is_successful())
            .max_by_key(|c| (c.started_at, c.id))
            .cloned())
    }

    async fn current_snapshot(&self, key: RankingKey) -> RankingResult<Option<RankingView>> {
        Ok(self
            .data
            .read()
            .await
            .snapshots
            .iter()
            .find(|v| v.snapshot.key() == key && v.snapshot.is_current)
            .cloned())
    }

    async fn snapshot(&self, id: SnapshotId) -> RankingResult<Option<RankingView>> {
        Ok(self
            .data
            .read()
            .await
            .snapshots
            .iter()
            .find(|v| v.snapshot.id == id)
            .cloned())
    }

    async fn snapshot_history(
        &self,
        key: RankingKey,
        limit: u32,
    ) -> RankingResult<Vec<RankingSnapshot>> {
        Ok(self
            .data
            .read()
            .await
            .snapshots
            .iter()
            .rev()
            .filter(|v| v.snapshot.key() == key)
            .take(limit as usize)
            .map(|v| v.snapshot.clone())
            .collect())
    }

    async fn enqueue_update(&self, update: &NewLiveUpdate) -> RankingResult<LiveRankingUpdate> {
        let mut data = self.data.write().await;
        let record = LiveRankingUpdate {
            id: data.updates.len() as UpdateId + 1,
            competition_id: update.key.competition_id,
            category_id: update.key.category_id,
            created_at: Utc::now(),
            update_type: update.update_type,
            affected_participants: update.affected_participants.clone(),
            payload: update.payload.clone(),
            broadcasted: false,
            broadcasted_at: None,
            attempts: 0,
            last_error: None,
        };
        data.updates.push(record.clone());
        Ok(record)
    }

    async fn pending_updates(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> RankingResult<Vec<LiveRankingUpdate>> {
        Ok(self
            .data
            .read()
            .await
            .updates
            .iter()
            .filter(|u| !u.broadcasted && u.attempts < max_attempts)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_broadcasted(&self, id: UpdateId, at: DateTime<Utc>) -> RankingResult<bool> {
        let mut data = self.data.write().await;
        match data.updates.iter_mut().find(|u| u.id == id && !u.broadcasted) {
            Some(update) => {
                update.broadcasted = true;
                update.broadcasted_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_broadcast_failure(&self, id: UpdateId, error: &str) -> RankingResult<()> {
        let mut data = self.data.write().await;
        if let Some(update) = data.updates.iter_mut().find(|u| u.id == id && !u.broadcasted) {
            update.attempts += 1;
            update.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn update(&self, id: UpdateId) -> RankingResult<Option<LiveRankingUpdate>> {
        Ok(self
            .data
            .read()
            .await
            .updates
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn health_check(&self) -> RankingResult<()> {
        Ok(())
    }
}

/// Check the one-current-snapshot invariant across every key in the store.
pub async fn current_snapshot_violations(store: &MemoryStore) -> Vec<RankingKey> {
    let data = store.data.read().await;
    let mut seen = HashSet::new();
    let mut violations = Vec::new();
    for view in data.snapshots.iter().filter(|v| v.snapshot.is_current) {
        if !seen.insert(view.snapshot.key()) {
            violations.push(view.snapshot.key());
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::UpdateType;
    use crate::scoring::Score;

    const KEY: RankingKey = RankingKey::new(1, 1);

    fn new_snapshot() -> NewSnapshot {
        NewSnapshot {
            key: KEY,
            total_participants: 1,
            completed_evaluations: 1,
            total_evaluations: 1,
            progress_percentage: 100.0,
            is_final: true,
        }
    }

    fn entry() -> RankingEntry {
        RankingEntry {
            participant_id: 7,
            rider_name: "Anna".to_string(),
            horse_name: "Bolero".to_string(),
            position: 1,
            previous_position: None,
            position_change: 0,
            total_score: Score::from_f64(70.0),
            percentage_score: 70.0,
            judge_scores: BTreeMap::new(),
            evaluations_completed: 1,
            evaluations_total: 1,
            is_tied: false,
            tied_with: Vec::new(),
        }
    }

    fn success() -> CalculationSuccess {
        CalculationSuccess {
            participants_processed: 1,
            changes: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_flips_previous_current() {
        let store = MemoryStore::new();

        for _ in 0..3 {
            let calculation = store.begin_calculation(KEY, Utc::now()).await.unwrap();
            store
                .commit_snapshot(calculation.id, &new_snapshot(), &[entry()], &success())
                .await
                .unwrap();
        }

        assert_eq!(store.snapshot_count(KEY).await, 3);
        assert_eq!(store.current_snapshot_count(KEY).await, 1);
        let current = store.current_snapshot(KEY).await.unwrap().unwrap();
        assert_eq!(current.snapshot.id, 3);
        assert!(current_snapshot_violations(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_calculation_completes_once() {
        let store = MemoryStore::new();
        let calculation = store.begin_calculation(KEY, Utc::now()).await.unwrap();

        store
            .fail_calculation(calculation.id, "boom", Utc::now())
            .await
            .unwrap();

        let err = store
            .commit_snapshot(calculation.id, &new_snapshot(), &[entry()], &success())
            .await
            .unwrap_err();
        assert!(matches!(err, RankingError::CalculationAlreadyCompleted(_)));
        assert_eq!(store.snapshot_count(KEY).await, 0);

        let stored = store.calculation(calculation.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CalculationStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_mark_broadcasted_is_idempotent() {
        let store = MemoryStore::new();
        let update = store
            .enqueue_update(&NewLiveUpdate {
                key: KEY,
                update_type: UpdateType::PositionChange,
                affected_participants: vec![7],
                payload: serde_json::json!({}),
            })
            .await
            .unwrap();

        assert!(store.mark_broadcasted(update.id, Utc::now()).await.unwrap());
        assert!(!store.mark_broadcasted(update.id, Utc::now()).await.unwrap());
        assert!(store.pending_updates(20, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configuration_insert_if_absent_keeps_existing() {
        let store = MemoryStore::new();
        let mut first = RankingConfiguration::defaults(KEY, Utc::now());
        first.calculation_interval = 60;
        store.save_configuration(&first).await.unwrap();

        let defaults = RankingConfiguration::defaults(KEY, Utc::now());
        let stored = store.insert_configuration_if_absent(&defaults).await.unwrap();
        assert_eq!(stored.calculation_interval, 60);
    }
}
