//! Live update broadcasting.
//!
//! Detected position changes become queued [`LiveRankingUpdate`] records.
//! The [`BroadcastDispatcher`] publishes them through an [`UpdatePublisher`]
//! and is the only component that flips a record to `broadcasted`.
//! Delivery is at-least-once: failed records stay pending and are picked up
//! by [`BroadcastDispatcher::broadcast_pending`] until they succeed or run
//! out of attempts.

pub mod dispatcher;
pub mod errors;
pub mod hub;
pub mod models;

use crate::live::ServerMessage;
use crate::scoring::RankingKey;
use async_trait::async_trait;

pub use dispatcher::{BroadcastDispatcher, DEFAULT_MAX_ATTEMPTS, Dispatch, SWEEP_BATCH_SIZE};
pub use errors::{BroadcastError, BroadcastResult};
pub use hub::{ConnectionId, DEFAULT_SUBSCRIBER_BUFFER, TopicHub};
pub use models::{LiveRankingUpdate, NewLiveUpdate, SweepReport, UpdateId, UpdateType};

/// Transport that fans a message out to a topic's subscribers
#[async_trait]
pub trait UpdatePublisher: Send + Sync {
    /// Deliver `message` to every subscriber of `key`.
    ///
    /// Returns the number of receivers; zero subscribers is a success.
    async fn publish(&self, key: RankingKey, message: ServerMessage) -> BroadcastResult<usize>;
}
