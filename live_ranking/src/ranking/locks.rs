//! Per-key mutual exclusion for the ranking pipeline.

use crate::scoring::RankingKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created async lock per ranking key.
///
/// Different keys never contend; the same key is serialized.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<RankingKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and hold the lock of `key` until the guard drops.
    pub async fn acquire(&self, key: RankingKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of keys that have ever been locked
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
