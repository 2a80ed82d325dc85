//! Configuration store with lazy defaults.

use super::models::{RankingConfigUpdate, RankingConfiguration};
use crate::db::RankingRepository;
use crate::ranking::errors::RankingResult;
use crate::ranking::locks::KeyedLocks;
use crate::scoring::RankingKey;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Per-key ranking configuration access.
///
/// Only [`get_or_create`](Self::get_or_create) and [`update`](Self::update)
/// write; reads fall back to unsaved defaults.
pub struct ConfigurationStore {
    repository: Arc<dyn RankingRepository>,
    locks: KeyedLocks,
}

impl ConfigurationStore {
    pub fn new(repository: Arc<dyn RankingRepository>) -> Self {
        Self {
            repository,
            locks: KeyedLocks::new(),
        }
    }

    /// Stored configuration, or the defaults without storing them.
    pub async fn get_or_default(&self, key: RankingKey) -> RankingResult<RankingConfiguration> {
        Ok(self
            .repository
            .get_configuration(key)
            .await?
            .unwrap_or_else(|| RankingConfiguration::defaults(key, Utc::now())))
    }

    /// Stored configuration, created with defaults on first reference.
    pub async fn get_or_create(&self, key: RankingKey) -> RankingResult<RankingConfiguration> {
        if let Some(config) = self.repository.get_configuration(key).await? {
            return Ok(config);
        }

        let defaults = RankingConfiguration::defaults(key, Utc::now());
        let stored = self.repository.insert_configuration_if_absent(&defaults).await?;
        log::info!("Created default ranking configuration for {key}");
        Ok(stored)
    }

    /// Apply a partial update. Out-of-range values are rejected before
    /// anything is written. Updates of the same key are serialized.
    pub async fn update(
        &self,
        key: RankingKey,
        update: &RankingConfigUpdate,
    ) -> RankingResult<RankingConfiguration> {
        let _guard = self.locks.acquire(key).await;
        let current = self.get_or_create(key).await?;
        let next = current.with_update(update, Utc::now())?;
        self.repository.save_configuration(&next).await?;
        log::info!(
            "Updated ranking configuration for {key}: auto_calculate={} interval={}s tie_break={} broadcast={} every {}s",
            next.auto_calculate,
            next.calculation_interval,
            next.tie_break_method,
            next.broadcast_enabled,
            next.broadcast_interval
        );
        Ok(next)
    }

    /// Debounce gate for automatic recomputation.
    pub async fn should_recalculate(&self, key: RankingKey, now: DateTime<Utc>) -> RankingResult<bool> {
        let config = self.get_or_default(key).await?;
        if !config.auto_calculate {
            return Ok(false);
        }
        let last = self.repository.last_successful_calculation(key).await?;
        Ok(config.is_due(last.map(|c| c.started_at), now))
    }

    pub async fn list(&self) -> RankingResult<Vec<RankingConfiguration>> {
        self.repository.list_configurations().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieBreakMethod;
    use crate::db::MemoryStore;
    use crate::ranking::{CalculationSuccess, NewSnapshot};
    use chrono::Duration;

    const KEY: RankingKey = RankingKey::new(4, 2);

    fn store() -> (Arc<MemoryStore>, ConfigurationStore) {
        let memory = Arc::new(MemoryStore::new());
        let store = ConfigurationStore::new(memory.clone());
        (memory, store)
    }

    #[tokio::test]
    async fn test_get_or_create_uses_defaults_once() {
        let (_, store) = store();
        let first = store.get_or_create(KEY).await.unwrap();
        assert_eq!(first.tie_break_method, TieBreakMethod::Percentage);

        let again = store.get_or_create(KEY).await.unwrap();
        assert_eq!(first, again);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reads_do_not_store_defaults() {
        let (_, store) = store();

        let config = store.get_or_default(KEY).await.unwrap();
        assert!(config.auto_calculate);
        assert!(store.should_recalculate(KEY, Utc::now()).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_partial_updates_keep_both_fields() {
        let (_, store) = store();
        let store = Arc::new(store);

        let handles: Vec<_> = [
            RankingConfigUpdate {
                tie_break_method: Some(TieBreakMethod::CollectiveMarks),
                ..Default::default()
            },
            RankingConfigUpdate {
                broadcast_interval: Some(30),
                ..Default::default()
            },
            RankingConfigUpdate {
                show_progress: Some(false),
                ..Default::default()
            },
        ]
        .into_iter()
        .map(|update| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.update(KEY, &update).await.unwrap() })
        })
        .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let config = store.get_or_create(KEY).await.unwrap();
        assert_eq!(config.tie_break_method, TieBreakMethod::CollectiveMarks);
        assert_eq!(config.broadcast_interval, 30);
        assert!(!config.show_progress);
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_configuration_unchanged() {
        let (_, store) = store();
        let before = store.get_or_create(KEY).await.unwrap();

        let err = store
            .update(
                KEY,
                &RankingConfigUpdate {
                    calculation_interval: Some(5),
                    auto_calculate: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.get_or_create(KEY).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_should_recalculate_after_interval() {
        let (memory, store) = store();
        let now = Utc::now();
        assert!(store.should_recalculate(KEY, now).await.unwrap());

        let started = now - Duration::seconds(10);
        let calculation = memory.begin_calculation(KEY, started).await.unwrap();
        memory
            .commit_snapshot(
                calculation.id,
                &NewSnapshot {
                    key: KEY,
                    total_participants: 0,
                    completed_evaluations: 0,
                    total_evaluations: 0,
                    progress_percentage: 0.0,
                    is_final: false,
                },
                &[],
                &CalculationSuccess {
                    participants_processed: 0,
                    changes: Vec::new(),
                    completed_at: started,
                },
            )
            .await
            .unwrap();

        assert!(!store.should_recalculate(KEY, now).await.unwrap());
        assert!(
            store
                .should_recalculate(KEY, now + Duration::seconds(20))
                .await
                .unwrap()
        );

        store
            .update(
                KEY,
                &RankingConfigUpdate {
                    auto_calculate: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(
            !store
                .should_recalculate(KEY, now + Duration::seconds(60))
                .await
                .unwrap()
        );
    }
}
