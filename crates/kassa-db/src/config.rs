//! Store configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::pool::DbConfig;

/// Store configuration as deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file (`KASSA_DATABASE_PATH`)
    pub database_path: PathBuf,

    /// Pool size (`KASSA_MAX_CONNECTIONS`)
    pub max_connections: u32,

    /// How long a writer waits for the lock before failing, in milliseconds
    /// (`KASSA_BUSY_TIMEOUT_MS`)
    pub busy_timeout_ms: u64,

    /// Apply pending migrations on connect (`KASSA_RUN_MIGRATIONS`)
    pub run_migrations: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: PathBuf::from("./kassa.db"),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            run_migrations: true,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = StoreConfig::default();

        let config = StoreConfig {
            database_path: lookup("KASSA_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "KASSA_MAX_CONNECTIONS", defaults.max_connections)?,

            busy_timeout_ms: parse_or(&lookup, "KASSA_BUSY_TIMEOUT_MS", defaults.busy_timeout_ms)?,

            run_migrations: parse_or(&lookup, "KASSA_RUN_MIGRATIONS", defaults.run_migrations)?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "KASSA_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(config)
    }

    /// Pool configuration for this store.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .run_migrations(self.run_migrations)
    }
}

impl From<StoreConfig> for DbConfig {
    fn from(config: StoreConfig) -> Self {
        config.db_config()
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
