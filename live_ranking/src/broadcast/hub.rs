//! In-process topic fan-out to live connections.

use super::errors::BroadcastResult;
use super::UpdatePublisher;
use crate::live::ServerMessage;
use crate::scoring::RankingKey;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Connection ID type
pub type ConnectionId = Uuid;

/// Messages buffered per connection before new ones are dropped
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

type Subscribers = HashMap<ConnectionId, mpsc::Sender<ServerMessage>>;

/// Topic → connection → bounded sender.
#[derive(Debug)]
pub struct TopicHub {
    topics: RwLock<HashMap<RankingKey, Subscribers>>,
    buffer: usize,
}

impl Default for TopicHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl TopicHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new connection under `key`.
    pub async fn subscribe(&self, key: RankingKey) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.topics
            .write()
            .await
            .entry(key)
            .or_default()
            .insert(id, tx);
        log::debug!("Connection {id} subscribed to {key}");
        (id, rx)
    }

    /// Remove a connection. Returns whether it was registered.
    pub async fn unsubscribe(&self, key: RankingKey, id: ConnectionId) -> bool {
        let mut topics = self.topics.write().await;
        let Some(subscribers) = topics.get_mut(&key) else {
            return false;
        };
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            topics.remove(&key);
        }
        removed
    }

    pub async fn subscriber_count(&self, key: RankingKey) -> usize {
        self.topics.read().await.get(&key).map_or(0, HashMap::len)
    }

    /// Total connections across every topic
    pub async fn connection_count(&self) -> usize {
        self.topics.read().await.values().map(HashMap::len).sum()
    }

    /// Send to every subscriber of `key`, pruning closed connections.
    ///
    /// Returns the number of connections the message was queued for. A full
    /// buffer skips that connection for this message only.
    pub async fn send(&self, key: RankingKey, message: &ServerMessage) -> usize {
        let mut topics = self.topics.write().await;
        let Some(subscribers) = topics.get_mut(&key) else {
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|id, sender| match sender.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                log::warn!("Connection {id} on {key} is lagging, dropping message");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                log::debug!("Pruning closed connection {id} from {key}");
                false
            }
        });

        if subscribers.is_empty() {
            topics.remove(&key);
        }
        delivered
    }
}

#[async_trait]
impl UpdatePublisher for TopicHub {
    async fn publish(&self, key: RankingKey, message: ServerMessage) -> BroadcastResult<usize> {
        Ok(self.send(key, &message).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: RankingKey = RankingKey::new(1, 1);

    #[tokio::test]
    async fn test_fan_out_stays_within_topic() {
        let hub = TopicHub::default();
        let (_, mut a) = hub.subscribe(KEY).await;
        let (_, mut b) = hub.subscribe(KEY).await;
        let (_, mut other) = hub.subscribe(RankingKey::new(1, 2)).await;

        let delivered = hub.send(KEY, &ServerMessage::error("x")).await;
        assert_eq!(delivered, 2);
        assert_eq!(a.recv().await, Some(ServerMessage::error("x")));
        assert_eq!(b.recv().await, Some(ServerMessage::error("x")));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_receivers_are_pruned() {
        let hub = TopicHub::default();
        let (_, rx) = hub.subscribe(KEY).await;
        let (_, _kept) = hub.subscribe(KEY).await;
        drop(rx);

        assert_eq!(hub.send(KEY, &ServerMessage::error("x")).await, 1);
        assert_eq!(hub.subscriber_count(KEY).await, 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_succeeds() {
        let hub = TopicHub::default();
        assert_eq!(hub.publish(KEY, ServerMessage::error("x")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let hub = TopicHub::default();
        let (id, _rx) = hub.subscribe(KEY).await;
        assert!(hub.unsubscribe(KEY, id).await);
        assert!(!hub.unsubscribe(KEY, id).await);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_full_buffer_keeps_connection() {
        let hub = TopicHub::new(1);
        let (_, mut rx) = hub.subscribe(KEY).await;

        assert_eq!(hub.send(KEY, &ServerMessage::error("first")).await, 1);
        assert_eq!(hub.send(KEY, &ServerMessage::error("second")).await, 0);
        assert_eq!(hub.subscriber_count(KEY).await, 1);
        assert_eq!(rx.recv().await, Some(ServerMessage::error("first")));
    }
}
