//! Ranking pipeline: tie resolution, snapshots, change detection and the
//! engine that runs them under a per-key lock.
//!
//! A recomputation of one (competition, category) key goes through:
//! 1. [`ScoreAggregator`](crate::scoring::ScoreAggregator): weighted totals
//! 2. [`TieResolver`]: reorder runs of equal totals, flag residual ties
//! 3. [`SnapshotManager`]: commit a new current snapshot atomically
//! 4. [`ChangeDetector`]: diff against the superseded snapshot
//! 5. [`BroadcastDispatcher`](crate::broadcast::BroadcastDispatcher): queue
//!    and push the changes
//!
//! Every attempt that reaches step 1 leaves exactly one
//! [`RankingCalculation`] record behind, succeeded or failed.

pub mod detector;
pub mod engine;
pub mod errors;
pub mod locks;
pub mod models;
pub mod snapshot;
pub mod tie_break;

pub use detector::ChangeDetector;
pub use engine::{AutoCalculationReport, EngineSettings, RankingEngine};
pub use errors::{RankingError, RankingResult, validate_key};
pub use locks::KeyedLocks;
pub use models::{
    CalculationId, CalculationStatus, CalculationSuccess, NewSnapshot, PositionChange,
    RankingCalculation, RankingEntry, RankingSnapshot, RankingView, RecomputeOutcome, SnapshotId,
};
pub use snapshot::{
    DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT, SnapshotManager, clamp_history_limit,
};
pub use tie_break::{
    CollectiveMarksTieBreak, PercentageTieBreak, TechnicalScoreTieBreak, TieBreakStrategy,
    TieBreaker, TieResolver,
};
