//! Per-(competition, category) ranking configuration.
//!
//! Configurations are created with defaults the first time a key is
//! referenced and changed only through validated partial updates.

pub mod models;
pub mod store;

pub use models::{
    BROADCAST_INTERVAL_RANGE, CALCULATION_INTERVAL_RANGE, DEFAULT_BROADCAST_INTERVAL,
    DEFAULT_CALCULATION_INTERVAL, RankingConfigUpdate, RankingConfiguration, TieBreakMethod,
};
pub use store::ConfigurationStore;
