//! Prepare stage: merge every manifest target and record the prepared manifest

use crate::error::GraftError;
use crate::manifest::{load_manifest, PreparedManifest, PreparedTarget, PublishTarget};
use crate::merge::{merge_overlay, MergeReport};
use crate::project::load_managed_paths;
use crate::tree::{load_document, save_document};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// File extension of merged place files
pub const PLACE_EXTENSION: &str = "rbxlx";

/// Outcome of merging one target
#[derive(Debug, Clone)]
pub struct PreparedOutput {
    pub target: PreparedTarget,
    pub report: MergeReport,
}

/// Inputs of the prepare stage. Relative paths resolve against `workspace_root`.
#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub workspace_root: PathBuf,
    pub manifest: PathBuf,
    pub output_dir: PathBuf,
    pub prepared_manifest: PathBuf,
}

impl PrepareRequest {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }
}

/// Merge one resolved target and write `<output_dir>/<name>.rbxlx`
#[instrument(skip_all, fields(target = %target.name, place_id = %target.place_id))]
pub fn merge_target(target: &PublishTarget, output_dir: &Path) -> Result<(PathBuf, MergeReport), GraftError> {
    let managed = load_managed_paths(&target.project_file)?;
    let mut base = load_document(&target.base_snapshot)
        .map_err(|e| GraftError::document(&target.base_snapshot, e))?;
    let overlay = load_document(&target.build_artifact)
        .map_err(|e| GraftError::document(&target.build_artifact, e))?;

    let report = merge_overlay(&mut base, &overlay, &managed).map_err(|source| GraftError::Merge {
        target: target.name.clone(),
        source,
    })?;

    let output = output_dir.join(format!("{}.{}", target.name, PLACE_EXTENSION));
    save_document(&base, &output).map_err(|e| GraftError::document(&output, e))?;
    info!(
        output = %output.display(),
        grafted = report.grafted.len(),
        pruned = report.pruned.len(),
        renamed = report.renamed_referents,
        "Merged place written"
    );
    Ok((output, report))
}

/// Merge every manifest target in declaration order and write the prepared
/// manifest. Any failure aborts the run; artifacts already written stay on disk
/// but no prepared manifest is produced.
#[instrument(skip_all, fields(manifest = %request.manifest.display()))]
pub fn prepare_targets(request: &PrepareRequest) -> Result<Vec<PreparedOutput>, GraftError> {
    let manifest_path = request.resolve(&request.manifest);
    let output_dir = request.resolve(&request.output_dir);
    let prepared_path = request.resolve(&request.prepared_manifest);

    let targets = load_manifest(&manifest_path, &request.workspace_root)?;
    info!(targets = targets.len(), "Loaded publish manifest");

    let mut outputs = Vec::with_capacity(targets.len());
    for target in &targets {
        let (artifact, report) = merge_target(target, &output_dir)?;
        outputs.push(PreparedOutput {
            target: PreparedTarget {
                name: target.name.clone(),
                place_id: target.place_id,
                artifact_path: relative_to(&artifact, &request.workspace_root),
            },
            report,
        });
    }

    let prepared = PreparedManifest {
        targets: outputs.iter().map(|o| o.target.clone()).collect(),
    };
    prepared.save(&prepared_path)?;
    info!(prepared_manifest = %prepared_path.display(), "Prepared manifest written");

    Ok(outputs)
}

/// `path` relative to `root` when it lies beneath it, otherwise unchanged
fn relative_to(path: &Path, root: &Path) -> PathBuf {
    let root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let path = path
        .parent()
        .and_then(|parent| dunce::canonicalize(parent).ok())
        .and_then(|parent| path.file_name().map(|name| parent.join(name)))
        .unwrap_or_else(|| path.to_path_buf());
    path.strip_prefix(&root)
        .map(Path::to_path_buf)
        .unwrap_or(path)
}
