//! Config facade: single entry point for loading configuration.

use super::merge::merge_policy;
use super::sources::{env, global_file, workspace_file};
use super::PlacegraftConfig;
use crate::error::GraftError;
use config::File;
use std::path::Path;
use tracing::debug;

/// Loads layered configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, `placegraft.toml`,
    /// `placegraft.$PLACEGRAFT_ENV.toml`, `PLACEGRAFT__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<PlacegraftConfig, GraftError> {
        let env_name = std::env::var(workspace_file::WORKSPACE_ENV_VAR).ok();
        Self::load_layers(
            workspace_root,
            global_file::global_config_path().as_deref(),
            env_name.as_deref(),
        )
    }

    /// Load with explicit global file and environment name
    pub fn load_layers(
        workspace_root: &Path,
        global_path: Option<&Path>,
        env_name: Option<&str>,
    ) -> Result<PlacegraftConfig, GraftError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder, global_path)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root, env_name)?;
        let builder = env::add_to_builder(builder);

        let config: PlacegraftConfig = builder.build()?.try_deserialize()?;
        debug!(workspace = %workspace_root.display(), "Configuration loaded");
        Ok(config)
    }

    /// Load a single explicit configuration file on top of the defaults
    pub fn load_from_file(path: &Path) -> Result<PlacegraftConfig, GraftError> {
        if !path.is_file() {
            return Err(GraftError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let config: PlacegraftConfig = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}
