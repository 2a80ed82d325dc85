//! HTTP/WebSocket API for the ranking server.
//!
//! # Modules
//!
//! - [`rankings`]: ranking reads, recomputation and configuration
//! - [`websocket`]: live ranking connections
//! - [`middleware`]: optional bearer-token identity for every v1 route
//!
//! # Endpoints Overview
//!
//! ## Rankings
//! - `GET /api/v1/rankings/{competition_id}/{category_id}` - Current ranking
//! - `GET /api/v1/rankings/{competition_id}/{category_id}/history` - Snapshot history (`?limit=N`)
//! - `GET /api/v1/rankings/{competition_id}/{category_id}/progress` - Evaluation progress
//! - `POST /api/v1/rankings/{competition_id}/{category_id}/recompute` - Force recomputation (staff/organizer)
//! - `POST /api/v1/rankings/{competition_id}/{category_id}/scores-changed` - Debounced trigger (staff/organizer/judge)
//! - `GET /api/v1/rankings/{competition_id}/{category_id}/config` - Configuration (staff/organizer)
//! - `PUT /api/v1/rankings/{competition_id}/{category_id}/config` - Partial update (staff/organizer)
//!
//! ## Broadcasts
//! - `POST /api/v1/broadcasts/pending` - Re-attempt undelivered updates (staff/organizer)
//!
//! ## WebSocket
//! - `GET /ws/{competition_id}/{category_id}?token=<jwt>` - Live ranking (token optional)
//!
//! ## Health Check
//! - `GET /health` - Server health status
//!
//! Read endpoints apply the same access rules as live connections: private
//! competitions need a staff, organizer or assigned-judge token.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use live_ranking::auth::TokenService;
//! use live_ranking::broadcast::TopicHub;
//! use live_ranking::db::MemoryStore;
//! use live_ranking::ranking::{EngineSettings, RankingEngine};
//! use lr_server::api::{AppState, create_router};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let hub = Arc::new(TopicHub::default());
//! let engine = Arc::new(RankingEngine::new(
//!     store.clone(),
//!     store,
//!     hub.clone(),
//!     EngineSettings::default(),
//! ));
//! let tokens = TokenService::new("a-secret-of-at-least-thirty-two-chars")?;
//!
//! let app = create_router(AppState::new(engine, hub, tokens));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. Restrict origins in production.

pub mod middleware;
pub mod rankings;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use live_ranking::{
    RankingEngine,
    auth::TokenService,
    broadcast::TopicHub,
    live::LiveGateway,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Cloned per request; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RankingEngine>,
    pub gateway: LiveGateway,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// Build the state around an engine that publishes through `hub`.
    pub fn new(engine: Arc<RankingEngine>, hub: Arc<TopicHub>, tokens: TokenService) -> Self {
        Self {
            gateway: LiveGateway::new(Arc::clone(&engine), hub),
            engine,
            tokens: Arc::new(tokens),
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// ```text
/// GET  /health
/// GET  /ws/{competition_id}/{category_id}?token=<jwt>
/// GET  /api/v1/rankings/{competition_id}/{category_id}
/// GET  /api/v1/rankings/{competition_id}/{category_id}/history
/// GET  /api/v1/rankings/{competition_id}/{category_id}/progress
/// POST /api/v1/rankings/{competition_id}/{category_id}/recompute
/// POST /api/v1/rankings/{competition_id}/{category_id}/scores-changed
/// GET  /api/v1/rankings/{competition_id}/{category_id}/config
/// PUT  /api/v1/rankings/{competition_id}/{category_id}/config
/// POST /api/v1/broadcasts/pending
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    // WebSocket route handles its own auth via query parameter
    let root_routes = Router::new()
        .route("/health", get(health_check))
        .route(
            "/ws/{competition_id}/{category_id}",
            get(websocket::websocket_handler),
        );

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", v1_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/rankings/{competition_id}/{category_id}",
            get(rankings::get_ranking),
        )
        .route(
            "/rankings/{competition_id}/{category_id}/history",
            get(rankings::get_history),
        )
        .route(
            "/rankings/{competition_id}/{category_id}/progress",
            get(rankings::get_progress),
        )
        .route(
            "/rankings/{competition_id}/{category_id}/recompute",
            post(rankings::recompute),
        )
        .route(
            "/rankings/{competition_id}/{category_id}/scores-changed",
            post(rankings::scores_changed),
        )
        .route(
            "/rankings/{competition_id}/{category_id}/config",
            get(rankings::get_config).put(rankings::update_config),
        )
        .route("/broadcasts/pending", post(rankings::broadcast_pending))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::viewer_middleware,
        ))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the ranking store answers, `503 Service Unavailable`
/// otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","version":"1.0.0","database":true,"live_connections":3,"timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = state.engine.health_check().await.is_ok();
    let live_connections = state.gateway.hub().connection_count().await;

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "live_connections": live_connections,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
