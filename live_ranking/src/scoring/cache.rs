//! Time-bounded cache for the maximum possible score of a key.

use super::models::{RankingKey, Score};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default time-to-live for cached maximum scores (1 hour)
pub const DEFAULT_MAX_SCORE_TTL: Duration = Duration::from_secs(3600);

/// Caches `max_possible_score` per key.
///
/// Readers tolerate staleness up to the TTL; `clear` and `invalidate` drop
/// entries immediately.
#[derive(Debug)]
pub struct MaxScoreCache {
    ttl: Duration,
    entries: Mutex<HashMap<RankingKey, (Score, Instant)>>,
}

impl MaxScoreCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value for `key`, computing and storing it when the
    /// entry is missing or older than the TTL.
    pub fn get_or_compute<F>(&self, key: RankingKey, now: Instant, compute: F) -> Score
    where
        F: FnOnce() -> Score,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((value, stored_at)) = entries.get(&key)
            && now.saturating_duration_since(*stored_at) < self.ttl
        {
            return *value;
        }

        let value = compute();
        entries.insert(key, (value, now));
        value
    }

    /// Drop the cached value for one key.
    pub fn invalidate(&self, key: RankingKey) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }

    /// Drop every cached value.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MaxScoreCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCORE_TTL)
    }
}
