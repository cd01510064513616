//! Workspace config file source: placegraft.toml and placegraft.{env}.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

pub const WORKSPACE_CONFIG_FILE: &str = "placegraft.toml";

/// Selects the environment-specific workspace file
pub const WORKSPACE_ENV_VAR: &str = "PLACEGRAFT_ENV";

/// Add workspace config files to builder.
/// Precedence: placegraft.toml (base) then placegraft.{env}.toml (env-specific).
pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
    env_name: Option<&str>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let base_config_path = workspace_root.join(WORKSPACE_CONFIG_FILE);
    if base_config_path.is_file() {
        builder = builder.add_source(
            File::from(base_config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    if let Some(env_name) = env_name.filter(|name| !name.is_empty()) {
        let env_config_path = workspace_root.join(format!("placegraft.{}.toml", env_name));
        if env_config_path.is_file() {
            builder = builder.add_source(
                File::from(env_config_path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
    }

    Ok(builder)
}
