//! Configuration loading for the ingesters and reasoning binaries.
//!
//! Everything is env-driven (`.env` is loaded via `dotenv` when present) —
//! no config file parser here since there is no server section to populate
//! from TOML.

use crate::error::{Result, SubstrateError};
use serde::{Deserialize, Serialize};

/// Complete runtime configuration for an ingestion or reasoning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub flusher: FlusherConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Tuning for the async flusher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlusherConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for FlusherConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_pool_size() -> u32 {
    10
}
fn default_workers() -> usize {
    3
}
fn default_queue_capacity() -> usize {
    16
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    20
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// `.env` if present. `DATABASE_URL` is required; everything else has a
    /// default.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use substrate_core::config::Config;
    ///
    /// std::env::set_var("DATABASE_URL", "postgresql://localhost/substrate");
    /// let config = Config::from_env()?;
    /// # Ok::<(), substrate_core::error::SubstrateError>(())
    /// ```
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();

        let url = std::env::var("DATABASE_URL")
            .map_err(|_| SubstrateError::Config("DATABASE_URL environment variable not set".into()))?;

        let mut config = Config {
            database: DatabaseConfig {
                url,
                pool_size: default_pool_size(),
            },
            flusher: FlusherConfig::default(),
            logging: LoggingConfig::default(),
        };

        if let Ok(pool_size) = std::env::var("SUBSTRATE_DB_POOL_SIZE") {
            if let Ok(v) = pool_size.parse() {
                config.database.pool_size = v;
            }
        }
        if let Ok(workers) = std::env::var("SUBSTRATE_FLUSHER_WORKERS") {
            if let Ok(v) = workers.parse() {
                config.flusher.workers = v;
            }
        }
        if let Ok(cap) = std::env::var("SUBSTRATE_FLUSHER_QUEUE_CAPACITY") {
            if let Ok(v) = cap.parse() {
                config.flusher.queue_capacity = v;
            }
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Install a `tracing` subscriber using `logging.level` as the default
    /// filter directive. Call once at process start.
    pub fn init_logging(&self) {
        let filter = tracing_subscriber::EnvFilter::try_new(&self.logging.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_database_url_is_a_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DATABASE_URL");
        let result = Config::from_env();
        assert!(matches!(result, Err(SubstrateError::Config(_))));
    }

    #[test]
    fn defaults_are_applied() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DATABASE_URL", "postgresql://localhost/substrate_test");
        std::env::remove_var("SUBSTRATE_FLUSHER_WORKERS");
        let config = Config::from_env().unwrap();
        assert_eq!(config.flusher.workers, 3);
        assert_eq!(config.flusher.queue_capacity, 16);
        std::env::remove_var("DATABASE_URL");
    }
}
