//! JSON message contract of live ranking connections.

use crate::broadcast::{LiveRankingUpdate, UpdateType};
use crate::ranking::RankingView;
use crate::scoring::{CategoryId, CompetitionId, ProgressStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client messages received over a live connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ask for the current ranking
    RequestRanking,
    /// Ask for evaluation progress
    RequestProgress,
    /// Restrict pushed updates to the listed types; `None` means all
    SubscribeUpdates {
        #[serde(default)]
        update_types: Option<Vec<UpdateType>>,
    },
    /// Heartbeat
    Ping,
}

/// Server messages sent over a live connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once right after a successful connect
    InitialRanking { ranking: Option<RankingView> },
    /// Reply to `request_ranking`
    CurrentRanking { ranking: Option<RankingView> },
    /// Pushed when the ranking of the topic changes
    RankingUpdate { update: LiveRankingUpdate },
    /// Reply to `request_progress`
    ProgressUpdate { progress: ProgressStats },
    Error { message: String },
    Success { message: String },
    SubscriptionConfirmed {
        competition_id: CompetitionId,
        category_id: CategoryId,
        update_types: Option<Vec<UpdateType>>,
    },
    Pong { timestamp: DateTime<Utc> },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Update type of a pushed update, if this is one
    pub fn update_type(&self) -> Option<UpdateType> {
        match self {
            ServerMessage::RankingUpdate { update } => Some(update.update_type),
            _ => None,
        }
    }
}
