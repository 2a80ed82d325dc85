//! Storage for rankings, configurations and the live update queue.
//!
//! The engine talks to storage only through two traits:
//! - [`RankingRepository`]: records this crate owns (configurations,
//!   snapshots, entries, calculations, live updates)
//! - [`CompetitionDirectory`]: read-only views of competitions,
//!   registrations and evaluations owned by other subsystems
//!
//! Both have a PostgreSQL implementation and an in-process [`MemoryStore`].

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use memory::{MemoryStore, current_snapshot_violations};
pub use postgres::{PgCompetitionDirectory, PgRankingRepository};
pub use repository::{CompetitionDirectory, RankingRepository};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use live_ranking::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = DatabaseConfig::from_env()?;
    ///     let db = Database::new(&config).await?;
    ///     db.migrate().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the ranking tables in `migrations/`
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
