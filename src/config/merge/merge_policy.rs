//! Merge rules: defaults, override order, conflict handling.

use crate::config::{
    default_api_base, default_conflict_backoff_secs, default_max_attempts,
    default_network_backoff_secs, default_request_timeout_secs,
};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
/// Later sources override earlier ones key by key; tables merge rather than replace.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")?
        .set_default("logging.color", true)?
        .set_default("publish.api_base", default_api_base())?
        .set_default("publish.max_attempts", i64::from(default_max_attempts()))?
        .set_default("publish.request_timeout_secs", default_request_timeout_secs() as i64)?
        .set_default("publish.conflict_backoff_secs", default_conflict_backoff_secs() as i64)?
        .set_default("publish.network_backoff_secs", default_network_backoff_secs() as i64)
}
