//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use live_ranking::auth::MIN_SECRET_LEN;
use live_ranking::db::DatabaseConfig;
use live_ranking::ranking::{EngineSettings, RankingError};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default server bind address
pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);

/// Signing secret used by `--in-memory` runs without `JWT_SECRET`
const DEVELOPMENT_JWT_SECRET: &str = "development-only-secret-do-not-deploy";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration; unused with `in_memory`
    pub database: DatabaseConfig,
    /// Serve from the in-process store instead of PostgreSQL
    pub in_memory: bool,
    /// JWT verification secret
    pub jwt_secret: String,
    /// Engine tunables
    pub engine: EngineSettings,
    /// Period of the pending-update broadcast sweep
    pub broadcast_sweep: Duration,
    /// Period of the auto-calculation sweep
    pub auto_calc_sweep: Duration,
    /// Prometheus exporter address, if metrics are enabled
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `in_memory` - Use the in-process store (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        in_memory: bool,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env_opt("SERVER_BIND")?.unwrap_or(DEFAULT_BIND),
        };

        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| DatabaseConfig::development().database_url);

        let database = DatabaseConfig {
            database_url,
            max_connections: parse_env_or("DB_MAX_CONNECTIONS", 20),
            min_connections: parse_env_or("DB_MIN_CONNECTIONS", 2),
            connection_timeout_secs: parse_env_or("DB_CONNECTION_TIMEOUT_SECS", 5),
            idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME_SECS", 1800),
        };

        // Required for PostgreSQL deployments
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if in_memory => DEVELOPMENT_JWT_SECRET.to_string(),
            Err(_) => {
                return Err(ConfigError::MissingRequired {
                    var: "JWT_SECRET".to_string(),
                    hint: "Generate with: openssl rand -hex 32".to_string(),
                });
            }
        };

        let config = ServerConfig {
            bind,
            database,
            in_memory,
            jwt_secret,
            engine: EngineSettings::from_env(),
            broadcast_sweep: Duration::from_secs(parse_env_or("BROADCAST_SWEEP_SECS", 5)),
            auto_calc_sweep: Duration::from_secs(parse_env_or("AUTO_CALC_SWEEP_SECS", 10)),
            metrics_bind: parse_env_opt("METRICS_BIND")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: format!("Must be at least {MIN_SECRET_LEN} characters"),
            });
        }

        if self.broadcast_sweep.is_zero() {
            return Err(ConfigError::Invalid {
                var: "BROADCAST_SWEEP_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.auto_calc_sweep.is_zero() {
            return Err(ConfigError::Invalid {
                var: "AUTO_CALC_SWEEP_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.engine.broadcast_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "BROADCAST_MAX_ATTEMPTS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if !self.in_memory {
            self.database.validate().map_err(|e| match e {
                RankingError::InvalidConfig { field, reason } => ConfigError::Invalid {
                    var: field.to_string(),
                    reason,
                },
                other => ConfigError::Invalid {
                    var: "DATABASE_URL".to_string(),
                    reason: other.to_string(),
                },
            })?;
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse environment variable or return default
fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse an optional environment variable, rejecting unparsable values
fn parse_env_opt<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Cannot parse '{value}'"),
        }),
        Err(_) => Ok(None),
    }
}
