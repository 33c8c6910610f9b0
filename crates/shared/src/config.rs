//! Configuration management for clipyard.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    #[serde(default)]
    pub data: DataConfig,

    /// Snapshot database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Client polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Retention / cleanup settings
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Request validation limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,

    /// Uploaded media (relative to root or absolute)
    pub uploads_dir: String,

    /// Produced media (relative to root or absolute)
    pub outputs_dir: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Persist store snapshots to SQLite
    pub enabled: bool,

    /// Database file path (relative to data directory or absolute)
    pub path: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub addr: String,

    /// Bind port
    pub port: u16,

    /// Base URL clients use to reach the server
    pub base_url: String,
}

/// Polling configuration
///
/// Clients observe job progress by re-fetching at this interval; there is no
/// push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Re-fetch interval in milliseconds
    pub interval_ms: u64,
}

/// Retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Run the periodic sweeper
    pub enabled: bool,

    /// Seconds between sweeps
    pub sweep_interval_seconds: u64,

    /// Terminal jobs older than this are purged
    pub job_retention_hours: u64,

    /// Unreferenced videos younger than this are kept
    pub orphan_grace_minutes: u64,

    /// Delete backing media files of purged videos
    pub delete_media: bool,

    /// Processing jobs without updates for this long are reported as stalled
    pub stall_timeout_seconds: u64,
}

/// Request validation limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Upper bound for a split's segment duration
    pub max_segment_duration_seconds: u32,

    /// Upper bound for a registered video's size
    pub max_file_size_bytes: u64,

    /// Accepted file extensions (lowercase, without dot)
    pub allowed_extensions: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root_dir: "data".to_string(),
            uploads_dir: "uploads".to_string(),
            outputs_dir: "outputs".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "clipyard.db".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            default_level: "info".to_string(),
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1".to_string(),
            port: 5001,
            base_url: "http://127.0.0.1:5001".to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 2000 }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_seconds: 300,
            job_retention_hours: 24,
            orphan_grace_minutes: 60,
            delete_media: true,
            stall_timeout_seconds: 600,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_segment_duration_seconds: 3600,
            max_file_size_bytes: 500 * 1024 * 1024,
            allowed_extensions: ["mp4", "mov", "avi", "mkv", "webm", "flv", "wmv", "m4v"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl RetentionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_seconds)
    }
}

impl LimitsConfig {
    /// Check the extension of an uploaded filename
    pub fn validate_extension(&self, filename: &str) -> std::result::Result<(), String> {
        let ext = match filename.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
            _ => return Err("File must have an extension".to_string()),
        };
        if self.allowed_extensions.iter().any(|allowed| *allowed == ext) {
            Ok(())
        } else {
            Err(format!(
                "Extension .{} not allowed. Allowed: {}",
                ext,
                self.allowed_extensions.join(", ")
            ))
        }
    }

    /// Check the size of an uploaded file
    pub fn validate_size(&self, size: u64) -> std::result::Result<(), String> {
        if size == 0 {
            return Err("File is empty".to_string());
        }
        if size > self.max_file_size_bytes {
            return Err(format!(
                "File too large. Maximum size: {}MB",
                self.max_file_size_bytes / (1024 * 1024)
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML file or create default if not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    fn under_data_dir(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }

    /// Get the path for the uploads directory
    pub fn uploads_dir(&self) -> PathBuf {
        self.under_data_dir(&self.data.uploads_dir)
    }

    /// Get the path for the outputs directory
    pub fn outputs_dir(&self) -> PathBuf {
        self.under_data_dir(&self.data.outputs_dir)
    }

    /// Get the path for the database file
    pub fn database_path(&self) -> PathBuf {
        self.under_data_dir(&self.database.path)
    }

    /// Get the path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.under_data_dir(&self.logging.log_dir)
    }

    /// Socket address string for the HTTP server
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.addr, self.server.port)
    }
}
