//! Configuration System
//!
//! Layered configuration: built-in defaults, then the user's global file, then
//! workspace files, then `PLACEGRAFT__SECTION__KEY` environment variables.
//! CLI flags are applied on top by the caller.

use crate::error::GraftError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;
pub use sources::workspace_file::{WORKSPACE_CONFIG_FILE, WORKSPACE_ENV_VAR};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacegraftConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub publish: PublishConfig,
}

/// Publish endpoint and retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delay unit after a version conflict; retry `k` waits `k` units
    #[serde(default = "default_conflict_backoff_secs")]
    pub conflict_backoff_secs: u64,

    /// Delay unit after a network error
    #[serde(default = "default_network_backoff_secs")]
    pub network_backoff_secs: u64,
}

pub(crate) fn default_api_base() -> String {
    "https://apis.roblox.com".to_string()
}

pub(crate) fn default_max_attempts() -> u32 {
    6
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    180
}

pub(crate) fn default_conflict_backoff_secs() -> u64 {
    20
}

pub(crate) fn default_network_backoff_secs() -> u64 {
    10
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            conflict_backoff_secs: default_conflict_backoff_secs(),
            network_backoff_secs: default_network_backoff_secs(),
        }
    }
}

impl PublishConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.api_base.trim().is_empty() {
            return Err("publish.api_base cannot be empty".to_string());
        }
        if self.max_attempts == 0 {
            return Err("publish.max_attempts must be >= 1".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("publish.request_timeout_secs must be > 0".to_string());
        }
        Ok(())
    }
}

impl PlacegraftConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), GraftError> {
        let mut errors = Vec::new();
        if let Err(e) = self.publish.validate() {
            errors.push(e);
        }
        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GraftError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )))
        }
    }
}
