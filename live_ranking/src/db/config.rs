//! Database configuration module.
//!
//! Provides configuration structures for database connection management.

use crate::ranking::{RankingError, RankingResult};
use std::env;
use std::str::FromStr;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,

    /// Maximum connection lifetime in seconds
    pub max_lifetime_secs: u64,
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> RankingResult<T> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| RankingError::InvalidConfig {
            field: name,
            reason: format!("'{value}' is not a valid number"),
        }),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 20)
    /// - `DB_MIN_CONNECTIONS`: Minimum pool size (default: 5)
    /// - `DB_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 10)
    /// - `DB_IDLE_TIMEOUT`: Idle timeout in seconds (default: 600)
    /// - `DB_MAX_LIFETIME`: Max lifetime in seconds (default: 1800)
    ///
    /// # Errors
    ///
    /// Fails if `DATABASE_URL` is not set or a numeric variable does not parse
    pub fn from_env() -> RankingResult<Self> {
        let database_url = env::var("DATABASE_URL").map_err(|_| RankingError::InvalidConfig {
            field: "DATABASE_URL",
            reason: "must be set".to_string(),
        })?;

        let config = Self {
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", 20)?,
            min_connections: env_or("DB_MIN_CONNECTIONS", 5)?,
            connection_timeout_secs: env_or("DB_CONNECTION_TIMEOUT", 10)?,
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", 600)?,
            max_lifetime_secs: env_or("DB_MAX_LIFETIME", 1800)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration for development
    ///
    /// Uses `postgres://postgres@localhost/live_ranking` as the database URL
    pub fn development() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/live_ranking".to_string(),
            max_connections: 20,
            min_connections: 5,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }

    /// Reject pool sizes sqlx would refuse
    pub fn validate(&self) -> RankingResult<()> {
        if self.max_connections == 0 {
            return Err(RankingError::InvalidConfig {
                field: "DB_MAX_CONNECTIONS",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_connections > self.max_connections {
            return Err(RankingError::InvalidConfig {
                field: "DB_MIN_CONNECTIONS",
                reason: format!(
                    "{} exceeds DB_MAX_CONNECTIONS ({})",
                    self.min_connections, self.max_connections
                ),
            });
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}
