//! Configuration for the history service

use serde::{Deserialize, Serialize};
use std::env;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Read-only store settings
    pub database: DatabaseConfig,

    /// Query and freshness settings
    pub history: HistoryConfig,

    /// Streaming settings
    pub stream: StreamConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Worker count
    pub workers: usize,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,
    /// Pool size
    pub max_connections: u32,
}

/// History query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Page size used when `limit` is absent
    pub default_limit: u64,

    /// Largest accepted `limit`
    pub max_limit: u64,

    /// Allowed lag (in ledgers) between history and core; 0 disables the check
    pub stale_threshold: u32,

    /// Whether ingestion records failed transactions
    pub ingest_failed_transactions: bool,

    /// Base URL used for hypermedia links
    pub base_url: String,
}

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Fallback re-execution interval when no ledger closes (milliseconds)
    pub poll_interval_ms: u64,

    /// Reconnect delay advertised to clients (milliseconds)
    pub retry_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                workers: 4,
            },
            database: DatabaseConfig {
                url: "sqlite://history.db".to_string(),
                max_connections: 20,
            },
            history: HistoryConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 200,
            stale_threshold: 0,
            ingest_failed_transactions: true,
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            retry_ms: 1_000,
        }
    }
}

impl Config {
    /// Load from defaults overlaid with `HISTORY__*` environment variables
    pub fn from_env() -> crate::Result<Self> {
        let defaults = Config::default();

        let mut builder = config::Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("server.workers", defaults.server.workers as i64)?
            .set_default("database.url", defaults.database.url)?
            .set_default("database.max_connections", defaults.database.max_connections as i64)?
            .set_default("history.default_limit", defaults.history.default_limit as i64)?
            .set_default("history.max_limit", defaults.history.max_limit as i64)?
            .set_default("history.stale_threshold", defaults.history.stale_threshold as i64)?
            .set_default(
                "history.ingest_failed_transactions",
                defaults.history.ingest_failed_transactions,
            )?
            .set_default("history.base_url", defaults.history.base_url)?
            .set_default("stream.poll_interval_ms", defaults.stream.poll_interval_ms as i64)?
            .set_default("stream.retry_ms", defaults.stream.retry_ms as i64)?;

        builder = builder.add_source(config::Environment::with_prefix("HISTORY").separator("__"));

        if let Ok(port) = env::var("SERVICE_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.history.default_limit == 0 || self.history.default_limit > self.history.max_limit {
            return Err(crate::Error::Config(format!(
                "default_limit {} must be within 1..={}",
                self.history.default_limit, self.history.max_limit
            )));
        }
        if i32::try_from(self.history.stale_threshold).is_err() {
            return Err(crate::Error::Config(format!(
                "stale_threshold {} exceeds the ledger sequence range",
                self.history.stale_threshold
            )));
        }
        if self.stream.poll_interval_ms == 0 {
            return Err(crate::Error::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.history.default_limit, 10);
        assert_eq!(config.history.max_limit, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_default_limit_above_max() {
        let mut config = Config::default();
        config.history.default_limit = 500;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_rejects_stale_threshold_beyond_ledger_range() {
        let mut config = Config::default();
        config.history.stale_threshold = i32::MAX as u32 + 1;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        config.history.stale_threshold = i32::MAX as u32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.stream.poll_interval_ms, 1_000);
        assert_eq!(parsed.server.port, 8000);
    }
}
