//! Database query timeout helpers
//!
//! Bounds individual storage round-trips so a stalled connection surfaces as
//! an error instead of holding a ranking key lock forever.

use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for snapshot commit transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for timeout operations
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    /// Operation timed out
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for timeout operations
pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Execute a query with timeout
///
/// # Example
///
/// ```no_run
/// use live_ranking::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
///
/// let row = with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT * FROM ranking_snapshots WHERE id = $1")
///         .bind(1_i64)
///         .fetch_one(pool)
/// ).await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> TimeoutResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TimeoutError::Database(e)),
        Err(_) => Err(TimeoutError::Timeout(duration)),
    }
}

/// Execute a query with the default timeout (5 seconds)
pub async fn with_default_timeout<F, T>(future: F) -> TimeoutResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}
