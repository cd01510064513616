//! Overlay merge: graft build-artifact subtrees into a base place
//!
//! Each managed path is replaced wholesale. The base's node at that path is
//! removed, and the overlay's node (if any) is deep-copied in with its referents
//! made unique against everything the base already holds.

use crate::error::MergeError;
use crate::project::ManagedPathSet;
use crate::tree::{remap_referents, Document, PathIndex};
use tracing::{debug, info, instrument, warn};

/// What a merge did to the base document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Managed paths now holding the overlay's subtree
    pub grafted: Vec<String>,
    /// Managed paths absent from the overlay, and therefore absent from the result
    pub pruned: Vec<String>,
    /// Referents renamed to avoid collisions
    pub renamed_referents: usize,
}

/// Merge `overlay` into `base` at every managed path, in set order.
///
/// `base` is mutated in place; `overlay` is only read. Fails without further
/// changes when a managed path's parent is missing from the base, leaving the
/// paths processed so far merged.
#[instrument(skip_all, fields(managed_paths = managed.len()))]
pub fn merge_overlay(
    base: &mut Document,
    overlay: &Document,
    managed: &ManagedPathSet,
) -> Result<MergeReport, MergeError> {
    let mut base_index = PathIndex::build(base);
    let overlay_index = PathIndex::build(overlay);
    let mut reserved = base.collect_referents();
    debug!(
        base_paths = base_index.len(),
        overlay_paths = overlay_index.len(),
        reserved = reserved.len(),
        "Indexed base and overlay"
    );

    let mut report = MergeReport::default();
    for managed_path in managed {
        let path = managed_path.to_string();
        let (parent_path, child_name) = managed_path
            .split_parent()
            .ok_or_else(|| MergeError::RootServicePath(path.clone()))?;

        let parent = base_index
            .get(&parent_path)
            .ok_or_else(|| MergeError::MissingParent {
                parent_path: parent_path.clone(),
                managed_path: path.clone(),
            })?;

        let removed = base.remove_child_items(parent, child_name);

        match overlay_index.get(&path) {
            Some(source) => {
                let graft = base.import_subtree(overlay, source);
                let remapping = remap_referents(base, graft, &mut reserved);
                base.append_child(parent, graft);
                info!(
                    managed_path = %path,
                    replaced = removed,
                    renamed = remapping.renamed.len(),
                    "Grafted managed path"
                );
                report.renamed_referents += remapping.renamed.len();
                report.grafted.push(path);
            }
            None => {
                warn!(
                    managed_path = %path,
                    removed,
                    "Managed path absent from build artifact; pruning it from base"
                );
                report.pruned.push(path);
            }
        }

        base_index = PathIndex::build(base);
    }

    Ok(report)
}
