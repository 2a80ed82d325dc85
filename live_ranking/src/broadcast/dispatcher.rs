//! Live update queue and delivery.

use super::errors::{BroadcastError, BroadcastResult};
use super::models::{LiveRankingUpdate, NewLiveUpdate, SweepReport, UpdateType};
use super::UpdatePublisher;
use crate::db::RankingRepository;
use crate::live::ServerMessage;
use crate::ranking::{PositionChange, RankingResult, SnapshotId};
use crate::scoring::RankingKey;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default number of failed attempts before a record is given up on
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Pending records handled per sweep
pub const SWEEP_BATCH_SIZE: u32 = 500;

#[derive(Serialize)]
struct ChangePayload<'a> {
    snapshot_id: SnapshotId,
    changes: &'a [PositionChange],
}

/// Outcome of an immediate delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Published and flipped to broadcasted by this call
    Delivered,
    /// Published, but another delivery had already flipped the record
    AlreadyDelivered,
    /// Skipped because the key published within its broadcast interval
    Throttled,
}

/// Owns the `broadcasted` transition of live update records.
pub struct BroadcastDispatcher {
    repository: Arc<dyn RankingRepository>,
    publisher: Arc<dyn UpdatePublisher>,
    max_attempts: u32,
    last_publish: Mutex<HashMap<RankingKey, Instant>>,
}

impl BroadcastDispatcher {
    pub fn new(
        repository: Arc<dyn RankingRepository>,
        publisher: Arc<dyn UpdatePublisher>,
        max_attempts: u32,
    ) -> Self {
        Self {
            repository,
            publisher,
            max_attempts: max_attempts.max(1),
            last_publish: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Queue a `PositionChange` update for a non-empty change set.
    pub async fn enqueue(
        &self,
        key: RankingKey,
        snapshot_id: SnapshotId,
        changes: &[PositionChange],
    ) -> RankingResult<Option<LiveRankingUpdate>> {
        if changes.is_empty() {
            return Ok(None);
        }

        let payload = serde_json::to_value(ChangePayload {
            snapshot_id,
            changes,
        })?;
        let update = self
            .repository
            .enqueue_update(&NewLiveUpdate {
                key,
                update_type: UpdateType::PositionChange,
                affected_participants: changes.iter().map(|c| c.participant_id).collect(),
                payload,
            })
            .await?;

        log::debug!(
            "Queued update {} for {} ({} participants moved)",
            update.id,
            key,
            changes.len()
        );
        Ok(Some(update))
    }

    /// Publish one record and flip it to broadcasted.
    ///
    /// A failed publish is recorded on the record, which stays pending.
    pub async fn dispatch(&self, update: &LiveRankingUpdate) -> BroadcastResult<Dispatch> {
        let key = update.key();
        let message = ServerMessage::RankingUpdate {
            update: update.clone(),
        };

        match self.publisher.publish(key, message).await {
            Ok(receivers) => {
                self.touch(key, Instant::now());
                let flipped = self.repository.mark_broadcasted(update.id, Utc::now()).await?;
                log::debug!("Published update {} to {receivers} connections on {key}", update.id);
                Ok(if flipped {
                    Dispatch::Delivered
                } else {
                    Dispatch::AlreadyDelivered
                })
            }
            Err(e) => {
                self.repository
                    .record_broadcast_failure(update.id, &e.to_string())
                    .await?;
                Err(e)
            }
        }
    }

    /// Like [`dispatch`](Self::dispatch), but skip keys that published
    /// within `interval`. Skipped records stay pending for the sweep.
    pub async fn dispatch_throttled(
        &self,
        update: &LiveRankingUpdate,
        interval: Duration,
    ) -> BroadcastResult<Dispatch> {
        if self.recently_published(update.key(), interval, Instant::now()) {
            return Ok(Dispatch::Throttled);
        }
        self.dispatch(update).await
    }

    /// Re-attempt every pending record below the attempt limit, oldest first.
    ///
    /// Idempotent: a record flips to broadcasted at most once, however many
    /// sweeps run concurrently.
    pub async fn broadcast_pending(&self) -> BroadcastResult<SweepReport> {
        let pending = self
            .repository
            .pending_updates(self.max_attempts, SWEEP_BATCH_SIZE)
            .await?;

        let mut report = SweepReport {
            attempted: pending.len(),
            ..Default::default()
        };

        for update in &pending {
            match self.dispatch(update).await {
                Ok(Dispatch::Delivered) => report.delivered += 1,
                Ok(_) => {}
                Err(BroadcastError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    report.failed += 1;
                    if update.attempts + 1 >= self.max_attempts {
                        report.abandoned += 1;
                        log::error!(
                            "Giving up on update {} for {} after {} attempts: {e}",
                            update.id,
                            update.key(),
                            self.max_attempts
                        );
                    } else {
                        log::warn!("Update {} for {} not delivered: {e}", update.id, update.key());
                    }
                }
            }
        }

        if report.attempted > 0 {
            log::info!(
                "Broadcast sweep: {} attempted, {} delivered, {} failed, {} abandoned",
                report.attempted,
                report.delivered,
                report.failed,
                report.abandoned
            );
        }
        Ok(report)
    }

    fn touch(&self, key: RankingKey, now: Instant) {
        self.last_publish
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, now);
    }

    fn recently_published(&self, key: RankingKey, interval: Duration, now: Instant) -> bool {
        self.last_publish
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .is_some_and(|last| now.duration_since(*last) < interval)
    }
}
