//! # Live Ranking
//!
//! Live ranking engine for judged equestrian competitions.
//!
//! Judges score participants on weighted parameters. For every
//! (competition, category) pair this crate aggregates those marks into
//! totals and percentages, orders participants with a configurable
//! tie-break, stores each result as an immutable snapshot, detects position
//! changes between snapshots and pushes them to live subscribers.
//!
//! ## Core Modules
//!
//! - [`scoring`]: weighted totals, percentages and evaluation progress
//! - [`ranking`]: tie resolution, snapshots, change detection, the engine
//! - [`config`]: per-key configuration with validated updates
//! - [`broadcast`]: queued live updates and their at-least-once delivery
//! - [`live`]: authorization and message contract of live connections
//! - [`auth`]: JWT viewer identity
//! - [`db`]: PostgreSQL and in-memory storage
//!
//! ## Example
//!
//! ```
//! use live_ranking::{RankingEngine, RankingKey};
//! use live_ranking::broadcast::TopicHub;
//! use live_ranking::db::MemoryStore;
//! use live_ranking::ranking::EngineSettings;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(MemoryStore::new());
//! let engine = RankingEngine::new(
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(TopicHub::default()),
//!     EngineSettings::default(),
//! );
//!
//! // Unknown competitions are rejected before anything is recorded.
//! let err = engine.recompute(RankingKey::new(1, 1)).await.unwrap_err();
//! assert!(err.is_not_found());
//! # }
//! ```

/// JWT viewer identity.
pub mod auth;

/// Live update queue and delivery.
pub mod broadcast;

/// Per-key ranking configuration.
pub mod config;

/// Storage backends.
pub mod db;

/// Live connection gateway and message contract.
pub mod live;

/// Ranking pipeline and engine.
pub mod ranking;

/// Score aggregation.
pub mod scoring;

pub use config::{RankingConfiguration, TieBreakMethod};
pub use ranking::{RankingEngine, RankingError, RankingResult, RankingView};
pub use scoring::{RankingKey, Score};
