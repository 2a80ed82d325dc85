//! Live connection gateway: authorization, topic registration and the
//! request/response side of the message contract.

use super::access::{CLOSE_ACCESS_DENIED, can_view};
use super::messages::{ClientMessage, ServerMessage};
use super::rate_limiter::ConnectionLimiter;
use crate::auth::Viewer;
use crate::broadcast::{ConnectionId, TopicHub, UpdateType};
use crate::ranking::{RankingEngine, RankingError};
use crate::scoring::RankingKey;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Connect failures
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Access denied to {0}")]
    AccessDenied(RankingKey),

    #[error(transparent)]
    Ranking(#[from] RankingError),
}

impl GatewayError {
    /// WebSocket close code for the failure, if it has a dedicated one
    pub fn close_code(&self) -> Option<u16> {
        match self {
            GatewayError::AccessDenied(_) => Some(CLOSE_ACCESS_DENIED),
            GatewayError::Ranking(_) => None,
        }
    }

    pub fn client_message(&self) -> String {
        match self {
            GatewayError::AccessDenied(_) => "Access denied".to_string(),
            GatewayError::Ranking(e) => e.client_message(),
        }
    }
}

/// State of one registered connection
#[derive(Debug)]
pub struct LiveSession {
    pub id: ConnectionId,
    pub key: RankingKey,
    pub viewer: Viewer,
    /// Declared with `subscribe_updates`; `None` accepts every type
    pub update_types: Option<Vec<UpdateType>>,
    limiter: ConnectionLimiter,
}

impl LiveSession {
    /// Whether a pushed message should reach this connection
    pub fn accepts(&self, message: &ServerMessage) -> bool {
        match (message.update_type(), &self.update_types) {
            (Some(kind), Some(types)) => types.contains(&kind),
            _ => true,
        }
    }
}

/// A freshly accepted connection
#[derive(Debug)]
pub struct LiveConnection {
    pub session: LiveSession,
    /// First message to send: the current ranking
    pub initial: ServerMessage,
    /// Messages pushed to the connection's topic
    pub updates: mpsc::Receiver<ServerMessage>,
}

/// Authorizes live connections and answers their requests.
#[derive(Clone)]
pub struct LiveGateway {
    engine: Arc<RankingEngine>,
    hub: Arc<TopicHub>,
}

impl LiveGateway {
    pub fn new(engine: Arc<RankingEngine>, hub: Arc<TopicHub>) -> Self {
        Self { engine, hub }
    }

    pub fn hub(&self) -> &TopicHub {
        &self.hub
    }

    /// Authorize and register a connection.
    ///
    /// Denied viewers get [`GatewayError::AccessDenied`] and nothing is
    /// registered. The connection is subscribed before the initial ranking
    /// is read, so no update committed in between is missed.
    pub async fn connect(
        &self,
        key: RankingKey,
        viewer: Viewer,
    ) -> Result<LiveConnection, GatewayError> {
        if !can_view(self.engine.directory(), &viewer, key.competition_id).await? {
            log::warn!("Live connection denied: {viewer} on {key}");
            return Err(GatewayError::AccessDenied(key));
        }

        let (id, updates) = self.hub.subscribe(key).await;
        let ranking = match self.engine.ranking_for(key, &viewer).await {
            Ok(ranking) => ranking,
            Err(e) => {
                self.hub.unsubscribe(key, id).await;
                return Err(e.into());
            }
        };

        log::info!("Live connection {id} opened: {viewer} on {key}");
        Ok(LiveConnection {
            session: LiveSession {
                id,
                key,
                viewer,
                update_types: None,
                limiter: ConnectionLimiter::default(),
            },
            initial: ServerMessage::InitialRanking { ranking },
            updates,
        })
    }

    /// Rate-limit, parse and answer one inbound text frame.
    ///
    /// Malformed input yields an `error` reply; the connection stays open.
    pub async fn handle_text(&self, session: &mut LiveSession, text: &str) -> ServerMessage {
        if let Err(exceeded) = session.limiter.check() {
            log::warn!(
                "Rate limit ({exceeded:?}) exceeded on live connection {} ({})",
                session.id,
                session.viewer
            );
            return ServerMessage::error(exceeded.client_message());
        }

        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(session, message).await,
            Err(e) => {
                log::debug!("Malformed message on live connection {}: {e}", session.id);
                ServerMessage::error("Invalid message format")
            }
        }
    }

    /// Answer one parsed client message
    pub async fn handle(&self, session: &mut LiveSession, message: ClientMessage) -> ServerMessage {
        match message {
            ClientMessage::RequestRanking => {
                match self.engine.ranking_for(session.key, &session.viewer).await {
                    Ok(ranking) => ServerMessage::CurrentRanking { ranking },
                    Err(e) => ServerMessage::error(e.client_message()),
                }
            }
            ClientMessage::RequestProgress => {
                match self.engine.progress_for(session.key, &session.viewer).await {
                    Ok(progress) => ServerMessage::ProgressUpdate { progress },
                    Err(e) => ServerMessage::error(e.client_message()),
                }
            }
            ClientMessage::SubscribeUpdates { update_types } => {
                session.update_types = update_types.clone();
                ServerMessage::SubscriptionConfirmed {
                    competition_id: session.key.competition_id,
                    category_id: session.key.category_id,
                    update_types,
                }
            }
            ClientMessage::Ping => ServerMessage::Pong {
                timestamp: Utc::now(),
            },
        }
    }

    /// Prepare a message pushed to the topic for one connection.
    ///
    /// Returns `None` when the session's declared update types exclude it,
    /// or when the key hides position changes and the viewer is not staff.
    pub async fn render_push(
        &self,
        session: &LiveSession,
        message: ServerMessage,
    ) -> Option<ServerMessage> {
        if !session.accepts(&message) {
            return None;
        }
        if message.update_type() == Some(UpdateType::PositionChange) && !session.viewer.is_manager() {
            match self.engine.display_configuration(session.key).await {
                Ok(config) if config.show_position_changes => {}
                Ok(_) => return None,
                Err(e) => {
                    log::warn!("Dropping push on live connection {}: {e}", session.id);
                    return None;
                }
            }
        }
        Some(message)
    }

    /// Deregister a connection
    pub async fn disconnect(&self, session: &LiveSession) {
        if self.hub.unsubscribe(session.key, session.id).await {
            log::info!("Live connection {} closed on {}", session.id, session.key);
        }
    }
}
