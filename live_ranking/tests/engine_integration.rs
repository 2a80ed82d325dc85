//! Integration tests for the ranking pipeline.
//!
//! Runs the engine end to end against the in-memory store: aggregation,
//! tie resolution, snapshot commits, change detection, calculation records
//! and live update delivery.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use live_ranking::auth::Viewer;
use live_ranking::broadcast::TopicHub;
use live_ranking::config::{RankingConfigUpdate, TieBreakMethod};
use live_ranking::db::{CompetitionDirectory, MemoryStore, current_snapshot_violations};
use live_ranking::live::ServerMessage;
use live_ranking::ranking::{CalculationStatus, EngineSettings, RankingEngine, RankingError};
use live_ranking::scoring::{
    CategoryId, CompetitionId, CompetitionInfo, Evaluation, JudgeId, ParameterScore, Participant,
    RankingKey, Score, ScoringParameter,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const KEY: RankingKey = RankingKey::new(1, 10);
const JUDGE: JudgeId = 100;

/// Two parameters: coefficient 1 (not collective) and coefficient 2 (collective)
fn parameters() -> Vec<ScoringParameter> {
    vec![
        ScoringParameter {
            id: 1,
            name: "Entry and halt".to_string(),
            coefficient: 1,
        },
        ScoringParameter {
            id: 2,
            name: "Collective: paces".to_string(),
            coefficient: 2,
        },
    ]
}

fn evaluation(participant_id: i64, basic: f64, collective: f64) -> Evaluation {
    Evaluation {
        judge_id: JUDGE,
        participant_id,
        completed: true,
        scores: vec![
            ParameterScore {
                parameter_id: 1,
                raw_score: Score::from_f64(basic),
                coefficient: 1,
            },
            ParameterScore {
                parameter_id: 2,
                raw_score: Score::from_f64(collective),
                coefficient: 2,
            },
        ],
    }
}

async fn seed_competition(store: &MemoryStore, is_public: bool) {
    store
        .add_competition(CompetitionInfo {
            id: KEY.competition_id,
            name: "Spring Dressage".to_string(),
            is_public,
            judge_ids: vec![JUDGE],
        })
        .await;
    store.set_parameters(KEY.category_id, parameters()).await;
}

async fn add_participant(store: &MemoryStore, id: i64) {
    store
        .add_participant(
            KEY,
            Participant {
                id,
                rider_name: format!("Rider {id}"),
                horse_name: format!("Horse {id}"),
            },
        )
        .await;
}

fn engine_for(store: Arc<MemoryStore>, hub: Arc<TopicHub>) -> RankingEngine {
    RankingEngine::new(store.clone(), store, hub, EngineSettings::default())
}

fn setup() -> (Arc<MemoryStore>, Arc<TopicHub>, RankingEngine) {
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(TopicHub::default());
    let engine = engine_for(store.clone(), hub.clone());
    (store, hub, engine)
}

/// Directory that can be told to fail evaluation reads
struct FlakyDirectory {
    inner: Arc<MemoryStore>,
    fail: AtomicBool,
}

#[async_trait]
impl CompetitionDirectory for FlakyDirectory {
    async fn competition(
        &self,
        id: CompetitionId,
    ) -> live_ranking::RankingResult<Option<CompetitionInfo>> {
        self.inner.competition(id).await
    }

    async fn category_parameters(
        &self,
        category_id: CategoryId,
    ) -> live_ranking::RankingResult<Vec<ScoringParameter>> {
        self.inner.category_parameters(category_id).await
    }

    async fn confirmed_participants(
        &self,
        key: RankingKey,
    ) -> live_ranking::RankingResult<Vec<Participant>> {
        self.inner.confirmed_participants(key).await
    }

    async fn evaluations(&self, key: RankingKey) -> live_ranking::RankingResult<Vec<Evaluation>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RankingError::Computation(
                "evaluation source unavailable".to_string(),
            ));
        }
        self.inner.evaluations(key).await
    }

    async fn is_judge_assigned(
        &self,
        judge_id: JudgeId,
        competition_id: CompetitionId,
    ) -> live_ranking::RankingResult<bool> {
        self.inner.is_judge_assigned(judge_id, competition_id).await
    }
}

// ============================================================================
// Pipeline
// ============================================================================

#[tokio::test]
async fn test_equal_totals_are_flagged_as_tied() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    for id in 1..=3 {
        add_participant(&store, id).await;
    }
    // A and B: 20 points each; C: 17
    store.record_evaluation(KEY, evaluation(1, 8.0, 6.0)).await;
    store.record_evaluation(KEY, evaluation(2, 8.0, 6.0)).await;
    store.record_evaluation(KEY, evaluation(3, 5.0, 6.0)).await;

    let outcome = engine.recompute(KEY).await.unwrap();
    let entries = &outcome.ranking.entries;

    let positions: Vec<u32> = entries.iter().map(|e| e.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);

    assert_eq!(entries[0].participant_id, 1);
    assert_eq!(entries[1].participant_id, 2);
    assert_eq!(entries[0].total_score, Score::from_f64(20.0));
    assert_eq!(entries[1].total_score, Score::from_f64(20.0));
    assert!(entries[0].is_tied && entries[1].is_tied);
    assert_eq!(entries[0].tied_with, vec![2]);
    assert_eq!(entries[1].tied_with, vec![1]);

    assert_eq!(entries[2].participant_id, 3);
    assert_eq!(entries[2].total_score, Score::from_f64(17.0));
    assert!(!entries[2].is_tied);
    assert!(entries[2].tied_with.is_empty());
}

#[tokio::test]
async fn test_collective_marks_break_equal_totals() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    add_participant(&store, 1).await;
    add_participant(&store, 2).await;
    // 8 + 6×2 = 20 (collective 12) vs 6 + 7×2 = 20 (collective 14)
    store.record_evaluation(KEY, evaluation(1, 8.0, 6.0)).await;
    store.record_evaluation(KEY, evaluation(2, 6.0, 7.0)).await;

    engine
        .update_configuration(
            KEY,
            &RankingConfigUpdate {
                tie_break_method: Some(TieBreakMethod::CollectiveMarks),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = engine.recompute(KEY).await.unwrap();
    let entries = &outcome.ranking.entries;
    assert_eq!(entries[0].participant_id, 2);
    assert_eq!(entries[1].participant_id, 1);
    assert!(!entries[0].is_tied);
    assert!(!entries[1].is_tied);
}

#[tokio::test]
async fn test_first_computation_has_no_changes() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    add_participant(&store, 1).await;
    store.record_evaluation(KEY, evaluation(1, 7.0, 7.0)).await;

    let outcome = engine.recompute(KEY).await.unwrap();

    assert!(outcome.changes.is_empty());
    assert_eq!(outcome.update_id, None);
    assert_eq!(outcome.ranking.entries[0].previous_position, None);
    assert_eq!(outcome.ranking.entries[0].position_change, 0);
    assert!(outcome.ranking.snapshot.is_current);
    assert!(outcome.ranking.snapshot.is_final);
    assert!(store.updates(KEY).await.is_empty());
}

#[tokio::test]
async fn test_move_from_fifth_to_second_is_reported() {
    let (store, hub, engine) = setup();
    seed_competition(&store, true).await;
    for id in 1..=5 {
        add_participant(&store, id).await;
        // Participant 1 best, participant 5 worst
        store
            .record_evaluation(KEY, evaluation(id, 10.0 - id as f64, 5.0))
            .await;
    }
    let first = engine.recompute(KEY).await.unwrap();
    assert_eq!(first.ranking.position_of(5), Some(5));

    let (_, mut updates) = hub.subscribe(KEY).await;

    // Between the first (19) and second (18) placed participants
    store.record_evaluation(KEY, evaluation(5, 8.5, 5.0)).await;
    let second = engine.recompute(KEY).await.unwrap();

    assert_eq!(second.ranking.position_of(5), Some(2));
    let moved = second
        .changes
        .iter()
        .find(|c| c.participant_id == 5)
        .unwrap();
    assert_eq!(moved.old_position, 5);
    assert_eq!(moved.new_position, 2);
    assert_eq!(moved.change, 3);

    // Participants 2, 3, 4 each drop one place
    let others: Vec<(i64, i32)> = second
        .changes
        .iter()
        .filter(|c| c.participant_id != 5)
        .map(|c| (c.participant_id, c.change))
        .collect();
    assert_eq!(others, vec![(2, -1), (3, -1), (4, -1)]);

    // Ordered by new position
    let new_positions: Vec<u32> = second.changes.iter().map(|c| c.new_position).collect();
    assert_eq!(new_positions, vec![2, 3, 4, 5]);

    let entry = second
        .ranking
        .entries
        .iter()
        .find(|e| e.participant_id == 5)
        .unwrap();
    assert_eq!(entry.previous_position, Some(5));
    assert_eq!(entry.position_change, 3);

    // The update was queued, pushed and flipped exactly once
    let update_id = second.update_id.unwrap();
    let records = store.updates(KEY).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, update_id);
    assert!(records[0].broadcasted);
    assert_eq!(records[0].affected_participants, vec![5, 2, 3, 4]);
    assert_eq!(
        records[0].payload["snapshot_id"],
        serde_json::json!(second.ranking.snapshot.id)
    );

    match updates.recv().await.unwrap() {
        ServerMessage::RankingUpdate { update } => assert_eq!(update.id, update_id),
        other => panic!("unexpected message: {other:?}"),
    }

    let calculation = engine
        .calculation(second.calculation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(calculation.status, CalculationStatus::Succeeded);
    assert_eq!(calculation.snapshot_id, Some(second.ranking.snapshot.id));
    assert_eq!(calculation.participants_processed, 5);
    assert_eq!(calculation.position_changes, second.changes);
}

#[tokio::test]
async fn test_recompute_without_score_changes_is_idempotent() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    for id in 1..=4 {
        add_participant(&store, id).await;
        store.record_evaluation(KEY, evaluation(id, 6.0, 6.0)).await;
    }

    let first = engine.recompute(KEY).await.unwrap();
    let second = engine.recompute(KEY).await.unwrap();

    assert!(second.changes.is_empty());
    assert_eq!(second.update_id, None);
    let order = |o: &live_ranking::ranking::RecomputeOutcome| {
        o.ranking
            .entries
            .iter()
            .map(|e| (e.participant_id, e.position, e.total_score))
            .collect::<Vec<_>>()
    };
    assert_eq!(order(&first), order(&second));
    assert!(second.ranking.snapshot.id > first.ranking.snapshot.id);
    assert_eq!(store.current_snapshot_count(KEY).await, 1);
}

#[tokio::test]
async fn test_incomplete_evaluations_count_toward_progress_only() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    add_participant(&store, 1).await;
    add_participant(&store, 2).await;
    store.record_evaluation(KEY, evaluation(1, 7.0, 7.0)).await;
    let mut draft = evaluation(2, 9.0, 9.0);
    draft.completed = false;
    store.record_evaluation(KEY, draft).await;

    let outcome = engine.recompute(KEY).await.unwrap();
    let snapshot = &outcome.ranking.snapshot;
    assert_eq!(snapshot.completed_evaluations, 1);
    assert_eq!(snapshot.total_evaluations, 2);
    assert_eq!(snapshot.progress_percentage, 50.0);
    assert!(!snapshot.is_final);

    let draft_entry = &outcome.ranking.entries[1];
    assert_eq!(draft_entry.participant_id, 2);
    assert_eq!(draft_entry.total_score, Score::ZERO);
    assert_eq!(draft_entry.evaluations_completed, 0);
    assert_eq!(draft_entry.evaluations_total, 1);

    let progress = engine.progress(KEY).await.unwrap();
    assert_eq!(progress.fully_evaluated, 1);
    assert_eq!(progress.not_evaluated, 1);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unknown_competition_records_nothing() {
    let (store, _, engine) = setup();

    let err = engine.recompute(KEY).await.unwrap_err();
    assert!(matches!(err, RankingError::CompetitionNotFound(1)));
    assert!(store.calculations(KEY).await.is_empty());
    assert_eq!(store.snapshot_count(KEY).await, 0);
}

#[tokio::test]
async fn test_failed_computation_keeps_previous_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(FlakyDirectory {
        inner: store.clone(),
        fail: AtomicBool::new(false),
    });
    let engine = RankingEngine::new(
        directory.clone(),
        store.clone(),
        Arc::new(TopicHub::default()),
        EngineSettings::default(),
    );
    seed_competition(&store, true).await;
    add_participant(&store, 1).await;
    store.record_evaluation(KEY, evaluation(1, 7.0, 7.0)).await;

    let good = engine.recompute(KEY).await.unwrap();

    directory.fail.store(true, Ordering::SeqCst);
    let err = engine.recompute(KEY).await.unwrap_err();
    assert!(matches!(err, RankingError::Computation(_)));

    let current = engine.current_ranking(KEY).await.unwrap().unwrap();
    assert_eq!(current.snapshot.id, good.ranking.snapshot.id);
    assert_eq!(store.snapshot_count(KEY).await, 1);

    let calculations = store.calculations(KEY).await;
    assert_eq!(calculations.len(), 2);
    let failed: Vec<_> = calculations
        .iter()
        .filter(|c| c.status == CalculationStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].error.as_deref().unwrap().contains("unavailable"));
    assert!(failed[0].completed_at.is_some());
    assert_eq!(failed[0].snapshot_id, None);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_recomputes_keep_one_current_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(engine_for(store.clone(), Arc::new(TopicHub::default())));
    seed_competition(&store, true).await;
    for id in 1..=6 {
        add_participant(&store, id).await;
        store
            .record_evaluation(KEY, evaluation(id, id as f64, 5.0))
            .await;
    }

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { engine.recompute(KEY).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.snapshot_count(KEY).await, 10);
    assert_eq!(store.current_snapshot_count(KEY).await, 1);
    assert!(current_snapshot_violations(&store).await.is_empty());

    let history = engine.ranking_history(KEY, Some(100)).await.unwrap();
    assert_eq!(history.len(), 10);
    assert!(history.windows(2).all(|w| w[0].id > w[1].id));
    assert!(history[0].is_current);
    assert!(history[1..].iter().all(|s| !s.is_current));

    let calculations = store.calculations(KEY).await;
    assert!(calculations.iter().all(|c| c.is_successful()));
}

// ============================================================================
// Triggers
// ============================================================================

#[tokio::test]
async fn test_score_change_notifications_are_debounced() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    add_participant(&store, 1).await;
    store.record_evaluation(KEY, evaluation(1, 7.0, 7.0)).await;

    // No successful calculation yet
    assert!(engine.notify_scores_changed(KEY).await.unwrap().is_some());
    // Within the 30 second interval
    assert!(engine.notify_scores_changed(KEY).await.unwrap().is_none());

    engine
        .update_configuration(
            KEY,
            &RankingConfigUpdate {
                auto_calculate: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(engine.notify_scores_changed(KEY).await.unwrap().is_none());
    assert_eq!(store.calculations(KEY).await.len(), 1);
}

#[tokio::test]
async fn test_auto_calculation_sweep_respects_interval() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    add_participant(&store, 1).await;
    store.record_evaluation(KEY, evaluation(1, 7.0, 7.0)).await;
    // Referencing the key creates its default configuration
    engine.configuration(KEY).await.unwrap();

    let report = engine.run_auto_calculation_sweep(Utc::now()).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.recomputed, 1);

    let report = engine.run_auto_calculation_sweep(Utc::now()).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.recomputed, 0);

    let later = Utc::now() + ChronoDuration::seconds(31);
    let report = engine.run_auto_calculation_sweep(later).await.unwrap();
    assert_eq!(report.recomputed, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_auto_calculation_sweep_continues_past_failures() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    add_participant(&store, 1).await;
    store.record_evaluation(KEY, evaluation(1, 7.0, 7.0)).await;
    engine.configuration(KEY).await.unwrap();
    // Configured, but its competition is unknown
    engine.configuration(RankingKey::new(99, 1)).await.unwrap();

    let report = engine.run_auto_calculation_sweep(Utc::now()).await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.recomputed, 1);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn test_anonymous_reads_leave_no_configuration_behind() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    let unused = RankingKey::new(KEY.competition_id, 999);

    let progress = engine.progress_for(unused, &Viewer::Anonymous).await.unwrap();
    assert_eq!(progress.total_participants, 0);
    assert!(engine.ranking_for(unused, &Viewer::Anonymous).await.unwrap().is_none());
    assert!(engine.notify_scores_changed(KEY).await.unwrap().is_some());

    // Only the recomputed key is configured
    let configured: Vec<RankingKey> = engine
        .configurations()
        .list()
        .await
        .unwrap()
        .iter()
        .map(|c| c.key())
        .collect();
    assert_eq!(configured, vec![KEY]);

    let report = engine
        .run_auto_calculation_sweep(Utc::now() + ChronoDuration::seconds(31))
        .await
        .unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(store.snapshot_count(unused).await, 0);
    assert!(store.calculations(unused).await.is_empty());
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_out_of_range_configuration_is_rejected() {
    let (_, _, engine) = setup();
    let before = engine.configuration(KEY).await.unwrap();

    let err = engine
        .update_configuration(
            KEY,
            &RankingConfigUpdate {
                calculation_interval: Some(5),
                show_progress: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = engine
        .update_configuration(
            KEY,
            &RankingConfigUpdate {
                broadcast_interval: Some(61),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert_eq!(engine.configuration(KEY).await.unwrap(), before);
}

#[tokio::test]
async fn test_disabled_broadcast_queues_nothing() {
    let (store, _, engine) = setup();
    seed_competition(&store, true).await;
    add_participant(&store, 1).await;
    add_participant(&store, 2).await;
    store.record_evaluation(KEY, evaluation(1, 8.0, 8.0)).await;
    store.record_evaluation(KEY, evaluation(2, 6.0, 6.0)).await;
    engine
        .update_configuration(
            KEY,
            &RankingConfigUpdate {
                broadcast_enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    engine.recompute(KEY).await.unwrap();

    store.record_evaluation(KEY, evaluation(2, 10.0, 10.0)).await;
    let outcome = engine.recompute(KEY).await.unwrap();

    assert_eq!(outcome.changes.len(), 2);
    assert_eq!(outcome.update_id, None);
    assert!(store.updates(KEY).await.is_empty());
}
