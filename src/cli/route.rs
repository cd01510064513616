//! CLI route: single route table and run context. Dispatches to the pipeline stages.

use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, PlacegraftConfig};
use crate::error::{GraftError, PublishError};
use crate::manifest::PreparedManifest;
use crate::prepare::{prepare_targets, PrepareRequest};
use crate::project::load_managed_paths;
use crate::publish::{publish_prepared, OpenCloudClient, RetryPolicy};
use std::path::{Path, PathBuf};
use tracing::info;

/// Runtime context for CLI execution: workspace root and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: PlacegraftConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, GraftError> {
        let config = match config_path {
            Some(ref cfg_path) => ConfigLoader::load_from_file(cfg_path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config)
    }

    /// Create run context from an already loaded configuration
    pub fn with_config(workspace_root: PathBuf, config: PlacegraftConfig) -> Result<Self, GraftError> {
        config.validate()?;
        if !workspace_root.is_dir() {
            return Err(GraftError::ConfigError(format!(
                "Workspace root is not a directory: {}",
                workspace_root.display()
            )));
        }
        let workspace_root = dunce::canonicalize(&workspace_root)
            .map_err(|e| GraftError::io(&workspace_root, e))?;
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &PlacegraftConfig {
        &self.config
    }

    /// Execute a command and return its printable output
    pub fn execute(&self, command: &Commands) -> Result<String, GraftError> {
        match command {
            Commands::Prepare {
                manifest,
                output_dir,
                prepared_manifest,
            } => self.handle_prepare(manifest, output_dir, prepared_manifest),
            Commands::Publish {
                manifest,
                universe_id,
                api_key,
                max_attempts,
            } => self.handle_publish(manifest, *universe_id, api_key, *max_attempts),
            Commands::Paths { project } => self.handle_paths(project),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn handle_prepare(
        &self,
        manifest: &Path,
        output_dir: &Path,
        prepared_manifest: &Path,
    ) -> Result<String, GraftError> {
        let request = PrepareRequest {
            workspace_root: self.workspace_root.clone(),
            manifest: manifest.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            prepared_manifest: prepared_manifest.to_path_buf(),
        };
        let outputs = prepare_targets(&request)?;

        let mut lines: Vec<String> = outputs
            .iter()
            .map(|output| {
                format!(
                    "Merged {} (placeId={}) -> {} [{} grafted, {} pruned]",
                    output.target.name,
                    output.target.place_id,
                    output.target.artifact_path.display(),
                    output.report.grafted.len(),
                    output.report.pruned.len()
                )
            })
            .collect();
        lines.push(format!(
            "Wrote prepared manifest: {}",
            prepared_manifest.display()
        ));
        Ok(lines.join("\n"))
    }

    fn handle_publish(
        &self,
        manifest: &Path,
        universe_id: u64,
        api_key: &str,
        max_attempts: Option<u32>,
    ) -> Result<String, GraftError> {
        let mut publish_config = self.config.publish.clone();
        if let Some(max_attempts) = max_attempts {
            publish_config.max_attempts = max_attempts;
        }
        let policy = RetryPolicy::from_config(&publish_config)?;

        let manifest_path = self.resolve(manifest);
        let prepared = PreparedManifest::load(&manifest_path)?;
        info!(
            targets = prepared.targets.len(),
            universe_id,
            max_attempts = policy.max_attempts(),
            "Publishing prepared manifest"
        );

        let client = OpenCloudClient::from_config(&publish_config, universe_id, api_key)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PublishError::ClientSetup(format!("Failed to create async runtime: {}", e)))?;
        let outcomes = runtime.block_on(publish_prepared(
            &client,
            &policy,
            &prepared,
            &self.workspace_root,
        ))?;

        Ok(outcomes
            .iter()
            .map(|outcome| outcome.summary())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn handle_paths(&self, project: &Path) -> Result<String, GraftError> {
        let managed = load_managed_paths(&self.resolve(project))?;
        Ok(managed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
