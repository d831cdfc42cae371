//! Market API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Market API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// HTTP server port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Connection pool size
    pub db_max_connections: u32,

    /// Redis connection string (optional; notifications are logged without it)
    pub redis_url: Option<String>,

    /// Redis pub/sub channel for notification events
    pub notify_channel: String,

    /// Outbox polling interval in seconds
    pub notify_poll_interval_secs: u64,

    /// Outbox entries delivered per poll
    pub notify_batch_size: u32,

    /// Timeout for fetching supplier price lists in seconds
    pub fetch_timeout_secs: u64,

    /// Largest price-list document accepted, in bytes
    pub fetch_max_bytes: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        MarketConfig {
            http_port: 8000,
            database_path: "./data/market.db".to_string(),
            db_max_connections: 5,
            redis_url: None,
            notify_channel: "market:notifications".to_string(),
            notify_poll_interval_secs: 5,
            notify_batch_size: 50,
            fetch_timeout_secs: 30,
            fetch_max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl MarketConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            http_port: parsed("HTTP_PORT", defaults.http_port)?,

            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),

            db_max_connections: parsed("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,

            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),

            notify_channel: env::var("NOTIFY_CHANNEL").unwrap_or(defaults.notify_channel),

            notify_poll_interval_secs: parsed(
                "NOTIFY_POLL_INTERVAL_SECS",
                defaults.notify_poll_interval_secs,
            )?,

            notify_batch_size: parsed("NOTIFY_BATCH_SIZE", defaults.notify_batch_size)?,

            fetch_timeout_secs: parsed("FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs)?,

            fetch_max_bytes: parsed("FETCH_MAX_BYTES", defaults.fetch_max_bytes)?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        if config.notify_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("NOTIFY_POLL_INTERVAL_SECS".to_string()));
        }
        if config.fetch_max_bytes == 0 {
            return Err(ConfigError::InvalidValue("FETCH_MAX_BYTES".to_string()));
        }

        Ok(config)
    }

    /// Outbox polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.notify_poll_interval_secs)
    }

    /// Price-list fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Reads `name` from the environment, falling back to `default` when unset.
fn parsed<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
