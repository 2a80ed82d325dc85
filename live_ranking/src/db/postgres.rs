//! PostgreSQL implementations of the repository traits.
//!
//! `PgRankingRepository` owns the tables in `migrations/`.
//! `PgCompetitionDirectory` reads the collaborating subsystems' tables:
//!
//! - `competitions (id, name, is_public)`
//! - `competition_judges (competition_id, judge_id)`
//! - `scoring_parameters (id, category_id, name, coefficient)`
//! - `registrations (id, competition_id, category_id, rider_name, horse_name, status)`
//! - `evaluations (id, competition_id, category_id, participant_id, judge_id, is_completed)`
//! - `evaluation_scores (evaluation_id, parameter_id, score NUMERIC(4,2))`

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::repository::{CompetitionDirectory, RankingRepository};
use super::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout, with_timeout};
use crate::broadcast::{LiveRankingUpdate, NewLiveUpdate, UpdateId, UpdateType};
use crate::config::RankingConfiguration;
use crate::ranking::{
    CalculationId, CalculationStatus, CalculationSuccess, NewSnapshot, PositionChange,
    RankingCalculation, RankingEntry, RankingError, RankingResult, RankingSnapshot, RankingView,
    SnapshotId,
};
use crate::scoring::{
    CategoryId, CompetitionId, CompetitionInfo, Evaluation, JudgeBreakdown, JudgeId,
    ParameterScore, Participant, RankingKey, Score, ScoringParameter,
};

fn timestamp(row: &PgRow, column: &str) -> DateTime<Utc> {
    row.get::<NaiveDateTime, _>(column).and_utc()
}

fn optional_timestamp(row: &PgRow, column: &str) -> Option<DateTime<Utc>> {
    row.get::<Option<NaiveDateTime>, _>(column)
        .map(|t| t.and_utc())
}

fn snapshot_from_row(row: &PgRow) -> RankingSnapshot {
    RankingSnapshot {
        id: row.get("id"),
        competition_id: row.get("competition_id"),
        category_id: row.get("category_id"),
        created_at: timestamp(row, "created_at"),
        total_participants: row.get::<i32, _>("total_participants") as u32,
        completed_evaluations: row.get::<i32, _>("completed_evaluations") as u32,
        total_evaluations: row.get::<i32, _>("total_evaluations") as u32,
        progress_percentage: row.get("progress_percentage"),
        is_current: row.get("is_current"),
        is_final: row.get("is_final"),
    }
}

fn entry_from_row(row: &PgRow) -> RankingEntry {
    RankingEntry {
        participant_id: row.get("participant_id"),
        rider_name: row.get("rider_name"),
        horse_name: row.get("horse_name"),
        position: row.get::<i32, _>("position") as u32,
        previous_position: row.get::<Option<i32>, _>("previous_position").map(|p| p as u32),
        position_change: row.get("position_change"),
        total_score: Score::from_hundredths(row.get("total_score")),
        percentage_score: row.get("percentage_score"),
        judge_scores: row
            .get::<Json<BTreeMap<JudgeId, JudgeBreakdown>>, _>("judge_scores")
            .0,
        evaluations_completed: row.get::<i32, _>("evaluations_completed") as u32,
        evaluations_total: row.get::<i32, _>("evaluations_total") as u32,
        is_tied: row.get("is_tied"),
        tied_with: row.get("tied_with"),
    }
}

fn calculation_from_row(row: &PgRow) -> RankingCalculation {
    RankingCalculation {
        id: row.get("id"),
        competition_id: row.get("competition_id"),
        category_id: row.get("category_id"),
        started_at: timestamp(row, "started_at"),
        completed_at: optional_timestamp(row, "completed_at"),
        duration_ms: row.get("duration_ms"),
        status: CalculationStatus::from_db(row.get::<&str, _>("status")),
        error: row.get("error"),
        participants_processed: row.get::<i32, _>("participants_processed") as u32,
        snapshot_id: row.get("snapshot_id"),
        position_changes: row
            .get::<Json<Vec<PositionChange>>, _>("position_changes")
            .0,
    }
}

fn update_from_row(row: &PgRow) -> LiveRankingUpdate {
    LiveRankingUpdate {
        id: row.get("id"),
        competition_id: row.get("competition_id"),
        category_id: row.get("category_id"),
        created_at: timestamp(row, "created_at"),
        update_type: UpdateType::from_db(row.get::<&str, _>("update_type")),
        affected_participants: row.get("affected_participants"),
        payload: row.get("payload"),
        broadcasted: row.get("broadcasted"),
        broadcasted_at: optional_timestamp(row, "broadcasted_at"),
        attempts: row.get::<i32, _>("attempts") as u32,
        last_error: row.get("last_error"),
    }
}

fn configuration_from_row(row: &PgRow) -> RankingResult<RankingConfiguration> {
    Ok(RankingConfiguration {
        competition_id: row.get("competition_id"),
        category_id: row.get("category_id"),
        auto_calculate: row.get("auto_calculate"),
        calculation_interval: row.get::<i32, _>("calculation_interval") as u32,
        tie_break_method: row.get::<&str, _>("tie_break_method").parse()?,
        broadcast_enabled: row.get("broadcast_enabled"),
        broadcast_interval: row.get::<i32, _>("broadcast_interval") as u32,
        show_judge_breakdown: row.get("show_judge_breakdown"),
        show_percentages: row.get("show_percentages"),
        show_progress: row.get("show_progress"),
        show_position_changes: row.get("show_position_changes"),
        updated_at: timestamp(row, "updated_at"),
    })
}

/// Ranking records in PostgreSQL
pub struct PgRankingRepository {
    pool: Arc<PgPool>,
}

impl PgRankingRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn entries(&self, snapshot_id: SnapshotId) -> RankingResult<Vec<RankingEntry>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT * FROM ranking_entries WHERE snapshot_id = $1 ORDER BY position")
                .bind(snapshot_id)
                .fetch_all(self.pool.as_ref()),
        )
        .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn view(&self, row: Option<PgRow>) -> RankingResult<Option<RankingView>> {
        let Some(row) = row else {
            return Ok(None);
        };
        let snapshot = snapshot_from_row(&row);
        let entries = self.entries(snapshot.id).await?;
        Ok(Some(RankingView { snapshot, entries }))
    }
}

#[async_trait]
impl RankingRepository for PgRankingRepository {
    async fn get_configuration(
        &self,
        key: RankingKey,
    ) -> RankingResult<Option<RankingConfiguration>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT * FROM ranking_configurations WHERE competition_id = $1 AND category_id = $2",
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;
        row.as_ref().map(configuration_from_row).transpose()
    }

    async fn insert_configuration_if_absent(
        &self,
        config: &RankingConfiguration,
    ) -> RankingResult<RankingConfiguration> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO ranking_configurations (
                    competition_id, category_id, auto_calculate, calculation_interval,
                    tie_break_method, broadcast_enabled, broadcast_interval,
                    show_judge_breakdown, show_percentages, show_progress,
                    show_position_changes, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (competition_id, category_id) DO NOTHING
                "#,
            )
            .bind(config.competition_id)
            .bind(config.category_id)
            .bind(config.auto_calculate)
            .bind(config.calculation_interval as i32)
            .bind(config.tie_break_method.to_string())
            .bind(config.broadcast_enabled)
            .bind(config.broadcast_interval as i32)
            .bind(config.show_judge_breakdown)
            .bind(config.show_percentages)
            .bind(config.show_progress)
            .bind(config.show_position_changes)
            .bind(config.updated_at.naive_utc())
            .execute(self.pool.as_ref()),
        )
        .await?;

        self.get_configuration(config.key())
            .await?
            .ok_or_else(|| RankingError::Computation(format!("configuration for {} vanished", config.key())))
    }

    async fn save_configuration(&self, config: &RankingConfiguration) -> RankingResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO ranking_configurations (
                    competition_id, category_id, auto_calculate, calculation_interval,
                    tie_break_method, broadcast_enabled, broadcast_interval,
                    show_judge_breakdown, show_percentages, show_progress,
                    show_position_changes, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (competition_id, category_id) DO UPDATE SET
                    auto_calculate = EXCLUDED.auto_calculate,
                    calculation_interval = EXCLUDED.calculation_interval,
                    tie_break_method = EXCLUDED.tie_break_method,
                    broadcast_enabled = EXCLUDED.broadcast_enabled,
                    broadcast_interval = EXCLUDED.broadcast_interval,
                    show_judge_breakdown = EXCLUDED.show_judge_breakdown,
                    show_percentages = EXCLUDED.show_percentages,
                    show_progress = EXCLUDED.show_progress,
                    show_position_changes = EXCLUDED.show_position_changes,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(config.competition_id)
            .bind(config.category_id)
            .bind(config.auto_calculate)
            .bind(config.calculation_interval as i32)
            .bind(config.tie_break_method.to_string())
            .bind(config.broadcast_enabled)
            .bind(config.broadcast_interval as i32)
            .bind(config.show_judge_breakdown)
            .bind(config.show_percentages)
            .bind(config.show_progress)
            .bind(config.show_position_changes)
            .bind(config.updated_at.naive_utc())
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(())
    }

    async fn list_configurations(&self) -> RankingResult<Vec<RankingConfiguration>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT * FROM ranking_configurations ORDER BY competition_id, category_id")
                .fetch_all(self.pool.as_ref()),
        )
        .await?;
        rows.iter().map(configuration_from_row).collect()
    }

    async fn begin_calculation(
        &self,
        key: RankingKey,
        started_at: DateTime<Utc>,
    ) -> RankingResult<RankingCalculation> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO ranking_calculations (competition_id, category_id, started_at, status)
                VALUES ($1, $2, $3, 'running')
                RETURNING *
                "#,
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .bind(started_at.naive_utc())
            .fetch_one(self.pool.as_ref()),
        )
        .await?;
        Ok(calculation_from_row(&row))
    }

    async fn commit_snapshot(
        &self,
        calculation_id: CalculationId,
        snapshot: &NewSnapshot,
        entries: &[RankingEntry],
        success: &CalculationSuccess,
    ) -> RankingResult<RankingView> {
        let key = snapshot.key;
        let created_at = success.completed_at;

        let committed = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.pool.begin().await?;

            let running = sqlx::query(
                "SELECT started_at FROM ranking_calculations WHERE id = $1 AND status = 'running' FOR UPDATE",
            )
            .bind(calculation_id)
            .fetch_optional(&mut *tx)
            .await?;
            let Some(running) = running else {
                // Dropping the transaction rolls it back.
                return Ok(None);
            };
            let started_at = timestamp(&running, "started_at");

            sqlx::query(
                "UPDATE ranking_snapshots SET is_current = FALSE WHERE competition_id = $1 AND category_id = $2 AND is_current",
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .execute(&mut *tx)
            .await?;

            let snapshot_id: SnapshotId = sqlx::query(
                r#"
                INSERT INTO ranking_snapshots (
                    competition_id, category_id, created_at, total_participants,
                    completed_evaluations, total_evaluations, progress_percentage,
                    is_current, is_final
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
                RETURNING id
                "#,
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .bind(created_at.naive_utc())
            .bind(snapshot.total_participants as i32)
            .bind(snapshot.completed_evaluations as i32)
            .bind(snapshot.total_evaluations as i32)
            .bind(snapshot.progress_percentage)
            .bind(snapshot.is_final)
            .fetch_one(&mut *tx)
            .await?
            .get("id");

            for entry in entries {
                sqlx::query(
                    r#"
                    INSERT INTO ranking_entries (
                        snapshot_id, participant_id, rider_name, horse_name, position,
                        previous_position, position_change, total_score, percentage_score,
                        judge_scores, evaluations_completed, evaluations_total, is_tied, tied_with
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                    "#,
                )
                .bind(snapshot_id)
                .bind(entry.participant_id)
                .bind(&entry.rider_name)
                .bind(&entry.horse_name)
                .bind(entry.position as i32)
                .bind(entry.previous_position.map(|p| p as i32))
                .bind(entry.position_change)
                .bind(entry.total_score.hundredths())
                .bind(entry.percentage_score)
                .bind(Json(&entry.judge_scores))
                .bind(entry.evaluations_completed as i32)
                .bind(entry.evaluations_total as i32)
                .bind(entry.is_tied)
                .bind(&entry.tied_with)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(
                r#"
                UPDATE ranking_calculations
                SET status = 'succeeded', completed_at = $2, duration_ms = $3,
                    participants_processed = $4, snapshot_id = $5, position_changes = $6
                WHERE id = $1
                "#,
            )
            .bind(calculation_id)
            .bind(success.completed_at.naive_utc())
            .bind((success.completed_at - started_at).num_milliseconds())
            .bind(success.participants_processed as i32)
            .bind(snapshot_id)
            .bind(Json(&success.changes))
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(Some(snapshot_id))
        })
        .await?;

        let snapshot_id =
            committed.ok_or(RankingError::CalculationAlreadyCompleted(calculation_id))?;

        Ok(RankingView {
            snapshot: RankingSnapshot {
                id: snapshot_id,
                competition_id: key.competition_id,
                category_id: key.category_id,
                created_at,
                total_participants: snapshot.total_participants,
                completed_evaluations: snapshot.completed_evaluations,
                total_evaluations: snapshot.total_evaluations,
                progress_percentage: snapshot.progress_percentage,
                is_current: true,
                is_final: snapshot.is_final,
            },
            entries: entries.to_vec(),
        })
    }

    async fn fail_calculation(
        &self,
        calculation_id: CalculationId,
        error: &str,
        completed_at: DateTime<Utc>,
    ) -> RankingResult<()> {
        let result = with_default_timeout(
            sqlx::query(
                r#"
                UPDATE ranking_calculations
                SET status = 'failed', error = $2, completed_at = $3,
                    duration_ms = (EXTRACT(EPOCH FROM ($3 - started_at)) * 1000)::BIGINT
                WHERE id = $1 AND status = 'running'
                "#,
            )
            .bind(calculation_id)
            .bind(error)
            .bind(completed_at.naive_utc())
            .execute(self.pool.as_ref()),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(RankingError::CalculationAlreadyCompleted(calculation_id));
        }
        Ok(())
    }

    async fn calculation(&self, id: CalculationId) -> RankingResult<Option<RankingCalculation>> {
        let row = with_default_timeout(
            sqlx::query("SELECT * FROM ranking_calculations WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;
        Ok(row.as_ref().map(calculation_from_row))
    }

    async fn last_successful_calculation(
        &self,
        key: RankingKey,
    ) -> RankingResult<Option<RankingCalculation>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT * FROM ranking_calculations
                WHERE competition_id = $1 AND category_id = $2 AND status = 'succeeded'
                ORDER BY started_at DESC, id DESC
                LIMIT 1
                "#,
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;
        Ok(row.as_ref().map(calculation_from_row))
    }

    async fn current_snapshot(&self, key: RankingKey) -> RankingResult<Option<RankingView>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT * FROM ranking_snapshots WHERE competition_id = $1 AND category_id = $2 AND is_current",
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;
        self.view(row).await
    }

    async fn snapshot(&self, id: SnapshotId) -> RankingResult<Option<RankingView>> {
        let row = with_default_timeout(
            sqlx::query("SELECT * FROM ranking_snapshots WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;
        self.view(row).await
    }

    async fn snapshot_history(
        &self,
        key: RankingKey,
        limit: u32,
    ) -> RankingResult<Vec<RankingSnapshot>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT * FROM ranking_snapshots
                WHERE competition_id = $1 AND category_id = $2
                ORDER BY id DESC
                LIMIT $3
                "#,
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .bind(i64::from(limit))
            .fetch_all(self.pool.as_ref()),
        )
        .await?;
        Ok(rows.iter().map(snapshot_from_row).collect())
    }

    async fn enqueue_update(&self, update: &NewLiveUpdate) -> RankingResult<LiveRankingUpdate> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO live_ranking_updates (
                    competition_id, category_id, update_type, affected_participants, payload
                )
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(update.key.competition_id)
            .bind(update.key.category_id)
            .bind(update.update_type.to_string())
            .bind(&update.affected_participants)
            .bind(&update.payload)
            .fetch_one(self.pool.as_ref()),
        )
        .await?;
        Ok(update_from_row(&row))
    }

    async fn pending_updates(
        &self,
        max_attempts: u32,
        limit: u32,
    ) -> RankingResult<Vec<LiveRankingUpdate>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT * FROM live_ranking_updates
                WHERE NOT broadcasted AND attempts < $1
                ORDER BY id
                LIMIT $2
                "#,
            )
            .bind(max_attempts as i32)
            .bind(i64::from(limit))
            .fetch_all(self.pool.as_ref()),
        )
        .await?;
        Ok(rows.iter().map(update_from_row).collect())
    }

    async fn mark_broadcasted(&self, id: UpdateId, at: DateTime<Utc>) -> RankingResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE live_ranking_updates SET broadcasted = TRUE, broadcasted_at = $2 WHERE id = $1 AND NOT broadcasted",
            )
            .bind(id)
            .bind(at.naive_utc())
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_broadcast_failure(&self, id: UpdateId, error: &str) -> RankingResult<()> {
        with_default_timeout(
            sqlx::query(
                "UPDATE live_ranking_updates SET attempts = attempts + 1, last_error = $2 WHERE id = $1 AND NOT broadcasted",
            )
            .bind(id)
            .bind(error)
            .execute(self.pool.as_ref()),
        )
        .await?;
        Ok(())
    }

    async fn update(&self, id: UpdateId) -> RankingResult<Option<LiveRankingUpdate>> {
        let row = with_default_timeout(
            sqlx::query("SELECT * FROM live_ranking_updates WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;
        Ok(row.as_ref().map(update_from_row))
    }

    async fn health_check(&self) -> RankingResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(self.pool.as_ref())).await?;
        Ok(())
    }
}

/// Read-only view of the competition, registration and evaluation tables
pub struct PgCompetitionDirectory {
    pool: Arc<PgPool>,
}

impl PgCompetitionDirectory {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompetitionDirectory for PgCompetitionDirectory {
    async fn competition(&self, id: CompetitionId) -> RankingResult<Option<CompetitionInfo>> {
        let row = with_default_timeout(
            sqlx::query("SELECT id, name, is_public FROM competitions WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let judge_ids = with_default_timeout(
            sqlx::query_scalar::<_, i64>(
                "SELECT judge_id FROM competition_judges WHERE competition_id = $1 ORDER BY judge_id",
            )
            .bind(id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(Some(CompetitionInfo {
            id: row.get("id"),
            name: row.get("name"),
            is_public: row.get("is_public"),
            judge_ids,
        }))
    }

    async fn category_parameters(
        &self,
        category_id: CategoryId,
    ) -> RankingResult<Vec<ScoringParameter>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT id, name, coefficient FROM scoring_parameters WHERE category_id = $1 ORDER BY id",
            )
            .bind(category_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows
            .iter()
            .map(|row| ScoringParameter {
                id: row.get("id"),
                name: row.get("name"),
                coefficient: row.get::<i32, _>("coefficient") as u32,
            })
            .collect())
    }

    async fn confirmed_participants(&self, key: RankingKey) -> RankingResult<Vec<Participant>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, rider_name, horse_name FROM registrations
                WHERE competition_id = $1 AND category_id = $2 AND status = 'confirmed'
                ORDER BY id
                "#,
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        Ok(rows
            .iter()
            .map(|row| Participant {
                id: row.get("id"),
                rider_name: row.get("rider_name"),
                horse_name: row.get("horse_name"),
            })
            .collect())
    }

    async fn evaluations(&self, key: RankingKey) -> RankingResult<Vec<Evaluation>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT e.id, e.judge_id, e.participant_id, e.is_completed,
                       s.parameter_id,
                       ROUND(s.score * 100)::BIGINT AS score_hundredths,
                       p.coefficient
                FROM evaluations e
                LEFT JOIN evaluation_scores s ON s.evaluation_id = e.id
                LEFT JOIN scoring_parameters p ON p.id = s.parameter_id
                WHERE e.competition_id = $1 AND e.category_id = $2
                ORDER BY e.id, s.parameter_id
                "#,
            )
            .bind(key.competition_id)
            .bind(key.category_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        let mut evaluations: Vec<(i64, Evaluation)> = Vec::new();
        for row in &rows {
            let id: i64 = row.get("id");
            if evaluations.last().is_none_or(|(last, _)| *last != id) {
                evaluations.push((
                    id,
                    Evaluation {
                        judge_id: row.get("judge_id"),
                        participant_id: row.get("participant_id"),
                        completed: row.get("is_completed"),
                        scores: Vec::new(),
                    },
                ));
            }

            if let (Some(parameter_id), Some(hundredths), Some(coefficient), Some((_, evaluation))) = (
                row.get::<Option<i64>, _>("parameter_id"),
                row.get::<Option<i64>, _>("score_hundredths"),
                row.get::<Option<i32>, _>("coefficient"),
                evaluations.last_mut(),
            ) {
                evaluation.scores.push(ParameterScore {
                    parameter_id,
                    raw_score: Score::from_hundredths(hundredths),
                    coefficient: coefficient as u32,
                });
            }
        }

        Ok(evaluations.into_iter().map(|(_, e)| e).collect())
    }

    async fn is_judge_assigned(
        &self,
        judge_id: JudgeId,
        competition_id: CompetitionId,
    ) -> RankingResult<bool> {
        let assigned = with_default_timeout(
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM competition_judges WHERE competition_id = $1 AND judge_id = $2)",
            )
            .bind(competition_id)
            .bind(judge_id)
            .fetch_one(self.pool.as_ref()),
        )
        .await?;
        Ok(assigned)
    }
}
