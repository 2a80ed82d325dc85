//! Broadcast error types.

use crate::ranking::RankingError;
use thiserror::Error;

/// Broadcast errors. Never fail a ranking computation.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// The publisher could not deliver the message
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Payload (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or updating the queue failed
    #[error(transparent)]
    Store(#[from] RankingError),
}

impl BroadcastError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            BroadcastError::Store(e) => e.client_message(),
            _ => "Broadcast failed".to_string(),
        }
    }
}

/// Result type for broadcast operations
pub type BroadcastResult<T> = Result<T, BroadcastError>;
