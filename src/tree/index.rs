//! Path index: slash-joined item names mapped to arena nodes
//!
//! The index is a snapshot. Rebuild it after any structural change beneath an
//! indexed ancestor.

use crate::tree::document::{Document, NodeId};
use std::collections::HashMap;
use tracing::trace;

/// Mapping from item path (`Service/Folder/Item`) to node
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    entries: HashMap<String, NodeId>,
}

impl PathIndex {
    /// Index every named item reachable from the document's top-level services.
    ///
    /// Nameless items are not indexed and contribute no path segment; their
    /// descendants are indexed under the nearest named ancestor's path. When two
    /// items share a path the last one in document order wins.
    pub fn build(doc: &Document) -> Self {
        let mut entries = HashMap::new();
        let mut stack: Vec<(NodeId, String)> = doc
            .child_items(doc.root())
            .map(|item| (item, String::new()))
            .collect();
        stack.reverse();

        while let Some((item, parent_path)) = stack.pop() {
            let current_path = match doc.item_name(item) {
                Some(name) => {
                    let path = join_path(&parent_path, &name);
                    entries.insert(path.clone(), item);
                    path
                }
                None => {
                    trace!(node = item.index(), parent = %parent_path, "Skipping nameless item");
                    parent_path
                }
            };
            let children: Vec<NodeId> = doc.child_items(item).collect();
            stack.extend(
                children
                    .into_iter()
                    .rev()
                    .map(|child| (child, current_path.clone())),
            );
        }

        Self { entries }
    }

    pub fn get(&self, path: &str) -> Option<NodeId> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All indexed paths, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}
