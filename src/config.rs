//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::api::ApiConfig;
use crate::ingest::IngestConfig;
use crate::storage::StorageConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` (for development) or `json` (for production)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Result<Self, ConfigError> {
        // Try default config locations
        let config_paths = [
            dirs::config_dir().map(|p| p.join("glucose").join("config.toml")),
            Some(PathBuf::from("/etc/glucose/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Storage overrides
        if let Some(path) = var("GLUCOSE_DATABASE") {
            self.storage = StorageConfig::new(path);
        }

        // Ingest overrides
        if let Some(dir) = var("GLUCOSE_DATA_DIR") {
            self.ingest.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(tz) = var("GLUCOSE_TIMEZONE") {
            self.ingest.timezone = tz.parse().map_err(|error| ConfigError::Env {
                key: "GLUCOSE_TIMEZONE".to_string(),
                error,
            })?;
        }

        // API overrides
        if let Some(host) = var("GLUCOSE_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("GLUCOSE_API_PORT") {
            self.api.port = port.parse().map_err(|_| ConfigError::Env {
                key: "GLUCOSE_API_PORT".to_string(),
                error: format!("'{}' is not a valid port", port),
            })?;
        }

        // Logging overrides
        if let Some(level) = var("GLUCOSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("GLUCOSE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {key}: {error}")]
    Env { key: String, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Glucose Configuration
#
# Environment variables override these settings:
# - GLUCOSE_DATABASE
# - GLUCOSE_DATA_DIR
# - GLUCOSE_TIMEZONE
# - GLUCOSE_API_HOST
# - GLUCOSE_API_PORT
# - GLUCOSE_LOG_LEVEL
# - GLUCOSE_LOG_FORMAT

[storage]
# SQLite database file (":memory:" for a throwaway store).
# Defaults to glucose/glucose.db under the platform data directory;
# a leading "~/" is expanded to the home directory.
# database_path = "~/.local/share/glucose/glucose.db"

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8000

# Maximum upload body size in bytes
max_body_size = 10485760

# Allowed CORS origins (empty = allow any)
cors_origins = []

[ingest]
# Default directory for `glucose-cli load-data`
# data_dir = "./data"

# File extensions to pick up (case-insensitive)
extensions = ["csv"]

# Rows before the column header row
metadata_rows = 1

# Zone of the export timestamps: "utc", "local" or an offset like "+01:00"
timezone = "utc"

# Files ingested concurrently
workers = 4

# Unparseable timestamp: "fail_file" (report the file) or "skip_row"
on_bad_timestamp = "fail_file"

# Extra vendor layouts, tried before the built-in LibreView (German) profile.
# [[ingest.profiles]]
# name = "libreview-en"
# timestamp_format = "%m-%d-%Y %I:%M %p"
# [ingest.profiles.columns]
# "Device Timestamp" = "timestamp"
# "Historic Glucose mg/dL" = "glucose_value"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
