//! Ranking error types.

use crate::db::timeouts::TimeoutError;
use crate::scoring::{CompetitionId, RankingKey};
use thiserror::Error;

/// Ranking engine errors
#[derive(Debug, Error)]
pub enum RankingError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database operation timed out
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// Payload (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request rejected before any state change
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration value outside its allowed range
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Competition unknown to the competition subsystem
    #[error("Competition not found: {0}")]
    CompetitionNotFound(CompetitionId),

    /// No ranking has been computed yet for the key
    #[error("No ranking available for {0}")]
    RankingNotFound(RankingKey),

    /// Viewer may not see this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A calculation record was completed twice
    #[error("Calculation {0} is already completed")]
    CalculationAlreadyCompleted(i64),

    /// Unexpected failure inside the ranking pipeline
    #[error("Ranking computation failed: {0}")]
    Computation(String),
}

impl RankingError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            RankingError::Database(_) | RankingError::Timeout(_) => {
                "Internal server error".to_string()
            }
            RankingError::Serialization(_) => "Internal server error".to_string(),
            RankingError::Computation(_) => "Ranking computation failed".to_string(),
            _ => self.to_string(),
        }
    }

    /// True for errors the caller caused (bad identifiers, bad config values)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RankingError::InvalidInput(_) | RankingError::InvalidConfig { .. }
        )
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, RankingError::Forbidden(_))
    }

    /// True when the requested resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RankingError::CompetitionNotFound(_) | RankingError::RankingNotFound(_)
        )
    }
}

/// Result type for ranking operations
pub type RankingResult<T> = Result<T, RankingError>;

/// Reject missing or non-positive identifiers.
pub fn validate_key(competition_id: i64, category_id: i64) -> RankingResult<RankingKey> {
    if competition_id <= 0 {
        return Err(RankingError::InvalidInput(format!(
            "competition_id must be positive, got {competition_id}"
        )));
    }
    if category_id <= 0 {
        return Err(RankingError::InvalidInput(format!(
            "category_id must be positive, got {category_id}"
        )));
    }
    Ok(RankingKey::new(competition_id, category_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_database_details() {
        let err = RankingError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), "Internal server error");

        let err = RankingError::InvalidConfig {
            field: "calculation_interval",
            reason: "must be between 10 and 300 seconds".to_string(),
        };
        assert!(err.client_message().contains("calculation_interval"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_key() {
        assert_eq!(validate_key(3, 7).unwrap(), RankingKey::new(3, 7));
        assert!(validate_key(0, 7).unwrap_err().is_validation());
        assert!(validate_key(3, -1).unwrap_err().is_validation());
    }
}
