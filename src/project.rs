//! Managed-path resolution from a project file
//!
//! A project file describes the build as a nested `tree` object. Keys starting
//! with `$` are metadata; a node holding `$path` is produced by the build, so the
//! build artifact owns that node's whole subtree in the merged place.

use crate::error::{GraftError, ProjectError};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Metadata key marking a node as built from source
pub const SOURCE_MARKER: &str = "$path";

/// A slash-joined item path rooted at a top-level service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagedPath {
    segments: Vec<String>,
}

impl ManagedPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Parent path and final segment; `None` for a bare root service
    pub fn split_parent(&self) -> Option<(String, &str)> {
        match self.segments.split_last() {
            Some((child, parent)) if !parent.is_empty() => Some((parent.join("/"), child.as_str())),
            _ => None,
        }
    }

    /// True when `self` is `other` or lies beneath it
    pub fn is_within(&self, other: &ManagedPath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

impl fmt::Display for ManagedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Top-most managed paths, ordered by depth then path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedPathSet {
    paths: Vec<ManagedPath>,
}

impl ManagedPathSet {
    /// Deduplicate and drop every path covered by a shallower one
    pub fn from_paths(mut discovered: Vec<ManagedPath>) -> Self {
        discovered.sort_by(|a, b| {
            a.depth()
                .cmp(&b.depth())
                .then_with(|| a.to_string().cmp(&b.to_string()))
        });
        let mut paths: Vec<ManagedPath> = Vec::new();
        for path in discovered {
            if paths.iter().any(|kept| path.is_within(kept)) {
                continue;
            }
            paths.push(path);
        }
        Self { paths }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedPath> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl<'a> IntoIterator for &'a ManagedPathSet {
    type Item = &'a ManagedPath;
    type IntoIter = std::slice::Iter<'a, ManagedPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// Resolve the managed paths of a parsed project file
pub fn resolve_managed_paths(project: &Value) -> Result<ManagedPathSet, ProjectError> {
    let tree = project
        .get("tree")
        .and_then(Value::as_object)
        .ok_or(ProjectError::MissingTree)?;

    let mut discovered = Vec::new();
    let mut stack: Vec<(&serde_json::Map<String, Value>, Vec<String>)> = vec![(tree, Vec::new())];
    while let Some((node, segments)) = stack.pop() {
        if node.contains_key(SOURCE_MARKER) && !segments.is_empty() {
            discovered.push(ManagedPath::new(segments.clone()));
        }
        for (key, value) in node {
            if key.starts_with('$') {
                continue;
            }
            if let Some(child) = value.as_object() {
                let mut child_segments = segments.clone();
                child_segments.push(key.clone());
                stack.push((child, child_segments));
            }
        }
    }

    let managed = ManagedPathSet::from_paths(discovered);
    if managed.is_empty() {
        return Err(ProjectError::NoManagedPaths);
    }
    if let Some(root_service) = managed.iter().find(|path| path.depth() < 2) {
        return Err(ProjectError::RootServicePath(root_service.to_string()));
    }
    debug!(count = managed.len(), "Resolved managed paths");
    Ok(managed)
}

/// Read a project file from disk and resolve its managed paths
pub fn load_managed_paths(path: &Path) -> Result<ManagedPathSet, GraftError> {
    let text = std::fs::read_to_string(path).map_err(|e| GraftError::io(path, e))?;
    serde_json::from_str::<Value>(&text)
        .map_err(ProjectError::from)
        .and_then(|value| resolve_managed_paths(&value))
        .map_err(|source| GraftError::Project {
            path: path.to_path_buf(),
            source,
        })
}
