//! Referent remapping for grafted subtrees
//!
//! Two passes over a subtree: the first renames every referent that collides with
//! the reserved set, the second rewrites `<Ref>` values that pointed at a renamed
//! referent. References to anything outside the subtree are left alone.

use crate::tree::document::{Document, NodeId, REF_TAG};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Prefix of minted referents
pub const REFERENT_PREFIX: &str = "RBX";

/// Old-to-new referent mapping produced by one remap call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Remapping {
    pub renamed: BTreeMap<String, String>,
    /// `<Ref>` values rewritten in the second pass
    pub rewritten_refs: usize,
}

impl Remapping {
    pub fn is_empty(&self) -> bool {
        self.renamed.is_empty()
    }
}

/// Mint a referent absent from `reserved` and reserve it.
///
/// Candidates are derived from `seed` and a counter, so the same seed and reserved
/// set always yield the same referent.
pub fn mint_referent(seed: &str, reserved: &mut HashSet<String>) -> String {
    let mut counter: u64 = 0;
    loop {
        let mut hasher = blake3::Hasher::new();
        hasher.update(seed.as_bytes());
        hasher.update(&counter.to_le_bytes());
        let digest = hasher.finalize();
        let candidate = format!(
            "{}{}",
            REFERENT_PREFIX,
            hex::encode_upper(&digest.as_bytes()[..16])
        );
        if reserved.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Make every referent in the subtree rooted at `subtree` unique against
/// `reserved`, updating internal `<Ref>` values to match.
///
/// `reserved` grows with every referent the subtree ends up holding, so repeated
/// calls against the same set never hand out a referent twice.
pub fn remap_referents(
    doc: &mut Document,
    subtree: NodeId,
    reserved: &mut HashSet<String>,
) -> Remapping {
    let nodes = doc.descendants(subtree);
    let mut renamed: BTreeMap<String, String> = BTreeMap::new();
    let mut kept: HashSet<String> = HashSet::new();

    for &node in &nodes {
        let Some(referent) = doc.referent(node) else {
            continue;
        };
        if reserved.contains(&referent) {
            let fresh = mint_referent(&referent, reserved);
            // A referent kept earlier in this subtree stays the target of its refs.
            if !kept.contains(&referent) {
                renamed.entry(referent).or_insert_with(|| fresh.clone());
            }
            doc.set_referent(node, &fresh);
        } else {
            reserved.insert(referent.clone());
            kept.insert(referent);
        }
    }

    let mut rewritten_refs = 0;
    if !renamed.is_empty() {
        for &node in &nodes {
            let element = doc.element_mut(node);
            if element.tag != REF_TAG {
                continue;
            }
            let value = element.text();
            if let Some(fresh) = renamed.get(value.trim()) {
                element.set_text(fresh);
                rewritten_refs += 1;
            }
        }
    }

    debug!(
        subtree = subtree.index(),
        renamed = renamed.len(),
        rewritten_refs,
        "Remapped subtree referents"
    );

    Remapping {
        renamed,
        rewritten_refs,
    }
}
