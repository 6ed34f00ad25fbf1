//! Configuration management for the digest services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! The database URL may also be assembled from the libpq-style `PG_*`
//! variables used by older deployments.

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Snapshot refresh cadence
    pub refresh: RefreshConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres URL; when absent it is built from PG_* variables
    pub url: Option<String>,

    /// Maximum number of connections
    pub max_connections: u32,

    /// Minimum number of connections
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// How often to check whether a newer READY digest exists
    pub latest_digest_interval_secs: u64,

    /// How often the whole snapshot is rebuilt, dropping lazily filled entries
    pub full_refresh_interval_secs: u64,

    /// Build the first snapshot before serving traffic
    pub warm_on_start: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info", "digest_common=debug,info")
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,

    /// Expose the Prometheus `/metrics` endpoint
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_secs: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 10,
            idle_timeout_secs: 300,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            latest_digest_interval_secs: 15 * 60,
            full_refresh_interval_secs: 240 * 60,
            warm_on_start: true,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: true,
            metrics_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__REFRESH__FULL_REFRESH_INTERVAL_SECS=3600
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

impl DatabaseConfig {
    /// Resolve the connection URL, falling back to the process environment
    pub fn connection_url(&self) -> Result<String> {
        self.connection_url_with(|key| std::env::var(key).ok())
    }

    /// Resolve the connection URL against an arbitrary variable lookup
    pub fn connection_url_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.to_string());
        }

        let host = lookup("PG_HOST").ok_or_else(|| AppError::Configuration {
            message: "database.url is not set and PG_HOST is missing".to_string(),
        })?;
        let port = lookup("PG_PORT").unwrap_or_else(|| "5432".to_string());
        let database = lookup("PG_DATABASE").ok_or_else(|| AppError::Configuration {
            message: "database.url is not set and PG_DATABASE is missing".to_string(),
        })?;

        let credentials = match (lookup("PG_USER"), lookup("PG_PASSWORD")) {
            (Some(user), Some(password)) => format!("{}:{}@", user, password),
            (Some(user), None) => format!("{}@", user),
            _ => String::new(),
        };

        Ok(format!(
            "postgres://{}{}:{}/{}",
            credentials, host, port, database
        ))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl RefreshConfig {
    pub fn latest_digest_interval(&self) -> Duration {
        Duration::from_secs(self.latest_digest_interval_secs.max(1))
    }

    pub fn full_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.full_refresh_interval_secs.max(1))
    }
}
