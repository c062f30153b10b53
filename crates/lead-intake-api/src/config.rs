//! Configuration types for the HTTP service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::ConfigError;

/// Routes served next to the webhook; the webhook path may not shadow them
pub const RESERVED_PATHS: [&str; 3] = ["/health", "/ready", "/metrics"];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Webhook endpoint settings
    pub webhooks: WebhookConfig,

    /// Persistence settings
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Check the configuration for values the service cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.webhooks.validate()?;
        self.storage.validate()?;
        self.logging.validate()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,

    /// Compress responses when the client accepts it
    pub enable_compression: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
            max_body_size: 1024 * 1024, // 1 MiB
            enable_compression: true,
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("server.host must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid("server.port must be non-zero"));
        }
        if self.max_body_size == 0 {
            return Err(invalid("server.max_body_size must be non-zero"));
        }
        Ok(())
    }
}

/// Webhook endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Webhook endpoint path
    pub endpoint_path: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            endpoint_path: "/api/webhook".to_string(),
        }
    }
}

impl WebhookConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let path = &self.endpoint_path;
        if !path.starts_with('/') {
            return Err(invalid(format!(
                "webhooks.endpoint_path must start with '/', got '{path}'"
            )));
        }
        if path.contains(['{', '}', '*', '?']) {
            return Err(invalid(format!(
                "webhooks.endpoint_path must be a literal path, got '{path}'"
            )));
        }
        if RESERVED_PATHS.contains(&path.as_str()) {
            return Err(invalid(format!(
                "webhooks.endpoint_path '{path}' collides with a built-in route"
            )));
        }
        Ok(())
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// SQLite database file
    Sqlite,
    /// Process memory, lost on restart
    Memory,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Database file used by the SQLite backend
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_path: PathBuf::from("data/lead-intake.db"),
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StorageBackend::Sqlite && self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                key: "storage.database_path".to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(invalid(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.level
            )));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
