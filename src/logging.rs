//! Logging System
//!
//! Structured logging using the `tracing` crate. Level, format and destination
//! come from configuration, then from `PLACEGRAFT_LOG*` environment variables,
//! then from CLI flags applied by the binary.

use crate::error::GraftError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Filter directives, e.g. `placegraft::publish=debug`
pub const LOG_ENV_VAR: &str = "PLACEGRAFT_LOG";
pub const LOG_FORMAT_ENV_VAR: &str = "PLACEGRAFT_LOG_FORMAT";
pub const LOG_OUTPUT_ENV_VAR: &str = "PLACEGRAFT_LOG_OUTPUT";

/// Log file used when output is `file` and no path was given
pub const DEFAULT_LOG_FILE: &str = "placegraft.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stderr, stdout, file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path (if output is "file")
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Colored output (text format on a terminal stream only)
    #[serde(default = "default_true")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    Stderr,
    Stdout,
    File,
}

fn parse_format(format: &str) -> Result<LogFormat, String> {
    match format {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        )),
    }
}

fn parse_output(output: &str) -> Result<LogOutput, String> {
    match output {
        "stderr" => Ok(LogOutput::Stderr),
        "stdout" => Ok(LogOutput::Stdout),
        "file" => Ok(LogOutput::File),
        other => Err(format!(
            "Invalid log output: {} (must be 'stderr', 'stdout', or 'file')",
            other
        )),
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        parse_format(&self.format)?;
        parse_output(&self.output)?;
        Ok(())
    }

    /// Apply `PLACEGRAFT_LOG_FORMAT` and `PLACEGRAFT_LOG_OUTPUT` when set
    fn with_env_overrides(&self, var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = self.clone();
        if let Some(format) = var(LOG_FORMAT_ENV_VAR).filter(|v| !v.is_empty()) {
            config.format = format;
        }
        if let Some(output) = var(LOG_OUTPUT_ENV_VAR).filter(|v| !v.is_empty()) {
            config.output = output;
        }
        config
    }
}

/// Initialize the logging system.
///
/// A subscriber installed earlier, such as one set up by a test harness, is left in place.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), GraftError> {
    let config = config
        .cloned()
        .unwrap_or_default()
        .with_env_overrides(|name| std::env::var(name).ok());

    let filter = build_env_filter(&config)?;
    let format = parse_format(&config.format).map_err(GraftError::ConfigError)?;
    let output = parse_output(&config.output).map_err(GraftError::ConfigError)?;

    let (writer, ansi) = match output {
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), config.color),
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), config.color),
        LogOutput::File => {
            let path = config
                .file
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GraftError::ConfigError(format!("Failed to create log directory: {}", e))
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    GraftError::ConfigError(format!("Failed to open log file {:?}: {}", path, e))
                })?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
    };

    let registry = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Global subscriber already installed; keeping it");
    }
    Ok(())
}

/// `PLACEGRAFT_LOG` wins over the configured level
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, GraftError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV_VAR) {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| GraftError::ConfigError(format!("Invalid log level '{}': {}", config.level, e)))
}
