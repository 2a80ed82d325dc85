//! Ranking API handlers.
//!
//! Reads follow the live access rules for the request's viewer. Recompute,
//! configuration and broadcast endpoints need a staff or organizer token;
//! `scores-changed` also accepts judges assigned to the competition.
//!
//! # Examples
//!
//! Current ranking of a public competition:
//! ```bash
//! curl http://localhost:8080/api/v1/rankings/12/3
//! ```
//!
//! Switch tie-break method:
//! ```bash
//! curl -X PUT http://localhost:8080/api/v1/rankings/12/3/config \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"tie_break_method": "COLLECTIVE_MARKS"}'
//! ```

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use live_ranking::{
    RankingError, RankingView,
    auth::{Viewer, ViewerRole},
    broadcast::SweepReport,
    config::{RankingConfigUpdate, RankingConfiguration},
    live::can_view,
    ranking::{RankingSnapshot, RecomputeOutcome, validate_key},
    scoring::{ProgressStats, RankingKey},
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::AppState;
use crate::{logging, metrics};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoresChangedResponse {
    /// False when the trigger was debounced
    pub recomputed: bool,
    pub outcome: Option<RecomputeOutcome>,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a ranking error to its HTTP status and client-safe message.
pub fn ranking_error(e: RankingError) -> ApiError {
    let status = if e.is_validation() {
        StatusCode::BAD_REQUEST
    } else if e.is_forbidden() {
        StatusCode::FORBIDDEN
    } else if e.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        log::error!("Ranking request failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    api_error(status, e.client_message())
}

fn key_from_path(competition_id: i64, category_id: i64) -> Result<RankingKey, ApiError> {
    validate_key(competition_id, category_id).map_err(ranking_error)
}

/// 404 for unknown competitions, 403 when `viewer` may not see the key.
async fn authorize_read(state: &AppState, viewer: &Viewer, key: RankingKey) -> Result<(), ApiError> {
    let directory = state.engine.directory();
    if directory
        .competition(key.competition_id)
        .await
        .map_err(ranking_error)?
        .is_none()
    {
        return Err(ranking_error(RankingError::CompetitionNotFound(
            key.competition_id,
        )));
    }

    if !can_view(directory, viewer, key.competition_id)
        .await
        .map_err(ranking_error)?
    {
        logging::log_security_event(
            "ranking_read_denied",
            viewer.user_id(),
            Some(key.competition_id),
            &format!("{viewer} may not view {key}"),
        );
        return Err(api_error(StatusCode::FORBIDDEN, "Access denied"));
    }
    Ok(())
}

fn require_authenticated(viewer: &Viewer) -> Result<ViewerRole, ApiError> {
    viewer
        .role()
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Authentication required"))
}

fn require_manager(viewer: &Viewer) -> Result<(), ApiError> {
    if require_authenticated(viewer)?.is_manager() {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::FORBIDDEN,
            "Staff or organizer role required",
        ))
    }
}

/// Count, time and log one calculation attempt.
///
/// Rejections that happen before a calculation record exists are not
/// counted.
fn record_calculation(
    key: RankingKey,
    trigger: &str,
    started: Instant,
    result: Result<&RecomputeOutcome, &RankingError>,
) {
    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(outcome) => {
            metrics::calculations_total(trigger, "succeeded");
            metrics::calculation_duration_ms(trigger, duration_ms as f64);
            metrics::position_changes(outcome.changes.len());
            logging::log_calculation(
                key.competition_id,
                key.category_id,
                trigger,
                Ok(outcome.ranking.snapshot.total_participants),
                duration_ms,
            );
        }
        Err(e) if e.is_not_found() || e.is_validation() => {}
        Err(e) => {
            metrics::calculations_total(trigger, "failed");
            logging::log_calculation(
                key.competition_id,
                key.category_id,
                trigger,
                Err(e.to_string().as_str()),
                duration_ms,
            );
        }
    }
}

/// Get the current ranking.
///
/// Non-staff viewers get the ranking with the key's display toggles applied.
///
/// # Errors
///
/// - `400 Bad Request`: Non-positive identifiers
/// - `403 Forbidden`: Viewer may not see this competition
/// - `404 Not Found`: Unknown competition, or nothing computed yet
pub async fn get_ranking(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((competition_id, category_id)): Path<(i64, i64)>,
) -> Result<Json<RankingView>, ApiError> {
    let key = key_from_path(competition_id, category_id)?;
    authorize_read(&state, &viewer, key).await?;

    match state.engine.ranking_for(key, &viewer).await {
        Ok(Some(ranking)) => Ok(Json(ranking)),
        Ok(None) => Err(ranking_error(RankingError::RankingNotFound(key))),
        Err(e) => Err(ranking_error(e)),
    }
}

/// Get snapshot metadata, most recent first.
///
/// `limit` defaults to 20 and is clamped to 1..=100.
pub async fn get_history(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((competition_id, category_id)): Path<(i64, i64)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<RankingSnapshot>>, ApiError> {
    let key = key_from_path(competition_id, category_id)?;
    authorize_read(&state, &viewer, key).await?;

    state
        .engine
        .ranking_history(key, query.limit)
        .await
        .map(Json)
        .map_err(ranking_error)
}

/// Get live evaluation progress.
///
/// # Errors
///
/// - `403 Forbidden`: Progress is not published and the viewer is not staff
pub async fn get_progress(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((competition_id, category_id)): Path<(i64, i64)>,
) -> Result<Json<ProgressStats>, ApiError> {
    let key = key_from_path(competition_id, category_id)?;
    authorize_read(&state, &viewer, key).await?;

    state
        .engine
        .progress_for(key, &viewer)
        .await
        .map(Json)
        .map_err(ranking_error)
}

/// Force a recomputation.
///
/// # Errors
///
/// - `401 Unauthorized`: No token
/// - `403 Forbidden`: Not staff or organizer
/// - `404 Not Found`: Unknown competition
/// - `500 Internal Server Error`: Calculation failed; the previous ranking stays current
pub async fn recompute(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((competition_id, category_id)): Path<(i64, i64)>,
) -> Result<Json<RecomputeOutcome>, ApiError> {
    require_manager(&viewer)?;
    let key = key_from_path(competition_id, category_id)?;

    let started = Instant::now();
    let result = state.engine.recompute(key).await;
    record_calculation(key, "manual", started, result.as_ref());

    result.map(Json).map_err(ranking_error)
}

/// Report that scores changed; recomputes unless debounced.
pub async fn scores_changed(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((competition_id, category_id)): Path<(i64, i64)>,
) -> Result<Json<ScoresChangedResponse>, ApiError> {
    let role = require_authenticated(&viewer)?;
    if !role.is_manager() && role != ViewerRole::Judge {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "Staff, organizer or judge role required",
        ));
    }
    let key = key_from_path(competition_id, category_id)?;
    // Judges only for competitions they are assigned to
    authorize_read(&state, &viewer, key).await?;

    let started = Instant::now();
    match state.engine.notify_scores_changed(key).await {
        Ok(Some(outcome)) => {
            record_calculation(key, "scores_changed", started, Ok(&outcome));
            Ok(Json(ScoresChangedResponse {
                recomputed: true,
                outcome: Some(outcome),
            }))
        }
        Ok(None) => Ok(Json(ScoresChangedResponse {
            recomputed: false,
            outcome: None,
        })),
        Err(e) => {
            record_calculation(key, "scores_changed", started, Err(&e));
            Err(ranking_error(e))
        }
    }
}

/// Get the key's configuration, creating the defaults on first use.
pub async fn get_config(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((competition_id, category_id)): Path<(i64, i64)>,
) -> Result<Json<RankingConfiguration>, ApiError> {
    require_manager(&viewer)?;
    let key = key_from_path(competition_id, category_id)?;

    state
        .engine
        .configuration(key)
        .await
        .map(Json)
        .map_err(ranking_error)
}

/// Apply a partial configuration update.
///
/// # Errors
///
/// - `400 Bad Request`: A value is out of range; nothing is stored
pub async fn update_config(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path((competition_id, category_id)): Path<(i64, i64)>,
    Json(update): Json<RankingConfigUpdate>,
) -> Result<Json<RankingConfiguration>, ApiError> {
    require_manager(&viewer)?;
    let key = key_from_path(competition_id, category_id)?;

    let config = state
        .engine
        .update_configuration(key, &update)
        .await
        .map_err(ranking_error)?;
    log::info!("Configuration for {key} updated by {viewer}");
    Ok(Json(config))
}

/// Re-attempt every undelivered live update now.
pub async fn broadcast_pending(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<SweepReport>, ApiError> {
    require_manager(&viewer)?;

    match state.engine.broadcast_pending().await {
        Ok(report) => {
            metrics::broadcast_sweep(&report);
            Ok(Json(report))
        }
        Err(e) => {
            log::error!("Broadcast sweep failed: {e}");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.client_message(),
            ))
        }
    }
}
