//! Logging setup shared by the server and the CLI.
//!
//! One `tracing` subscriber with an `EnvFilter`, an optional console layer
//! and an optional daily-rolling file layer per component.

use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log directory path
    pub log_dir: String,
    /// Component name (used for log file naming)
    pub component: String,
    /// Default log level
    pub default_level: Level,
    /// Enable console output
    pub console: bool,
    /// Enable file output
    pub file: bool,
    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "data/logs".to_string(),
            component: "clipyard".to_string(),
            default_level: Level::INFO,
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// Logging settings from the `[logging]` config section
    ///
    /// Unknown level names fall back to `info`.
    pub fn from_config(config: &Config, component: &str) -> Self {
        let default_level = config
            .logging
            .default_level
            .parse()
            .unwrap_or(Level::INFO);
        Self {
            log_dir: config.log_dir().to_string_lossy().to_string(),
            component: component.to_string(),
            default_level,
            console: config.logging.console,
            file: config.logging.file,
            json_format: config.logging.json_format,
        }
    }

    /// Filter used when `RUST_LOG` is not set
    pub fn directives(&self) -> String {
        format!(
            "{component}={level},shared={level},tower_http={level},hyper=warn,reqwest=warn,h2=warn",
            component = self.component.replace('-', "_"),
            level = self.default_level,
        )
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// File logs roll daily into `{log_dir}/{component}.YYYY-MM-DD`, as JSON
/// when `json_format` is set.
pub fn init(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed(),
        );
    }

    if config.file {
        let log_dir = Path::new(&config.log_dir);
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", config.log_dir))?;
        let appender = tracing_appender::rolling::daily(log_dir, &config.component);

        let layer = fmt::layer().with_target(true).with_ansi(false);
        layers.push(if config.json_format {
            layer.json().with_current_span(true).with_writer(appender).boxed()
        } else {
            layer
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(appender)
                .boxed()
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(
        component = %config.component,
        file = config.file,
        log_dir = %config.log_dir,
        "Logging initialized"
    );
    Ok(())
}
