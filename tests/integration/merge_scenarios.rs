//! Merge engine scenarios over realistic place documents

use crate::integration::test_utils::{item, place, ref_prop, shape, subtrees_by_path};
use placegraft::merge::merge_overlay;
use placegraft::project::resolve_managed_paths;
use placegraft::tree::{parse_document, write_document, Document, PathIndex};
use std::collections::HashSet;

fn base_place() -> String {
    place(&[
        item(
            "ServiceA",
            "ServiceA",
            "RBX1",
            "",
            &format!(
                "{}{}",
                item(
                    "Folder",
                    "Existing",
                    "RBX2",
                    "",
                    &item("Script", "Old", "RBX3", &ref_prop("Target", "RBX4"), "")
                ),
                item("Folder", "Other", "RBX4", &ref_prop("Partner", "RBX2"), "")
            ),
        ),
        item(
            "ServiceB",
            "ServiceB",
            "RBX5",
            "",
            &item(
                "Model",
                "Untouched",
                "RBX6",
                &format!("{}{}", ref_prop("PrimaryPart", "RBX7"), ref_prop("Link", "RBX4")),
                &item("Part", "Part", "RBX7", "\n        <bool name=\"Anchored\">true</bool>", ""),
            ),
        ),
    ])
}

/// The build renumbers everything from scratch, so its referents collide with the base's.
fn overlay_place() -> String {
    place(&[item(
        "ServiceA",
        "ServiceA",
        "RBX1",
        "",
        &item(
            "Folder",
            "Existing",
            "RBX4",
            &ref_prop("Main", "RBX5"),
            &format!(
                "{}{}",
                item("Script", "Main", "RBX5", &ref_prop("Parent", "RBX4"), ""),
                item("ModuleScript", "Util &amp; Helpers", "RBX9", &ref_prop("Outside", "RBX6"), "")
            ),
        ),
    )])
}

fn managed(paths: &[&str]) -> placegraft::project::ManagedPathSet {
    resolve_managed_paths(&serde_json::from_str(&crate::integration::test_utils::project_json(paths)).unwrap())
        .unwrap()
}

fn all_referents(doc: &Document) -> Vec<String> {
    doc.descendants(doc.root())
        .into_iter()
        .filter_map(|id| doc.referent(id))
        .collect()
}

#[test]
fn test_replace_existing_and_prune_missing() {
    let mut base = parse_document(&base_place()).unwrap();
    let overlay = parse_document(&overlay_place()).unwrap();
    let managed = managed(&["ServiceA/Existing", "ServiceA/Other"]);

    let report = merge_overlay(&mut base, &overlay, &managed).unwrap();

    assert_eq!(report.grafted, vec!["ServiceA/Existing"]);
    assert_eq!(report.pruned, vec!["ServiceA/Other"]);

    let index = PathIndex::build(&base);
    assert!(index.contains("ServiceA/Existing/Main"));
    assert!(index.contains("ServiceA/Existing/Util & Helpers"));
    assert!(!index.contains("ServiceA/Existing/Old"));
    assert!(!index.contains("ServiceA/Other"));

    // Same structure as the overlay's node, referents aside
    let overlay_index = PathIndex::build(&overlay);
    assert_eq!(
        shape(&base, index.get("ServiceA/Existing").unwrap()),
        shape(&overlay, overlay_index.get("ServiceA/Existing").unwrap())
    );
}

#[test]
fn test_referents_unique_after_merge() {
    let mut base = parse_document(&base_place()).unwrap();
    let overlay = parse_document(&overlay_place()).unwrap();
    let untouched: HashSet<String> = ["RBX1", "RBX5", "RBX6", "RBX7"].iter().map(|s| s.to_string()).collect();

    let report = merge_overlay(&mut base, &overlay, &managed(&["ServiceA/Existing", "ServiceA/Other"])).unwrap();

    let referents = all_referents(&base);
    let unique: HashSet<&String> = referents.iter().collect();
    assert_eq!(unique.len(), referents.len(), "duplicate referent in {:?}", referents);
    for kept in &untouched {
        assert!(referents.contains(kept));
    }
    // RBX4 and RBX5 collided with the base; RBX9 did not.
    assert_eq!(report.renamed_referents, 2);
    assert!(referents.contains(&"RBX9".to_string()));
}

#[test]
fn test_internal_refs_follow_and_external_refs_stay() {
    let mut base = parse_document(&base_place()).unwrap();
    let overlay = parse_document(&overlay_place()).unwrap();

    merge_overlay(&mut base, &overlay, &managed(&["ServiceA/Existing"])).unwrap();

    let index = PathIndex::build(&base);
    let existing = index.get("ServiceA/Existing").unwrap();
    let main = index.get("ServiceA/Existing/Main").unwrap();
    let util = index.get("ServiceA/Existing/Util & Helpers").unwrap();
    let existing_ref = base.referent(existing).unwrap();
    let main_ref = base.referent(main).unwrap();

    let ref_text = |node, name: &str| {
        base.descendants(node)
            .into_iter()
            .map(|id| base.element(id))
            .find(|el| el.tag == "Ref" && el.attribute("name").as_deref() == Some(name))
            .map(|el| el.text())
            .unwrap()
    };
    assert_eq!(ref_text(existing, "Main"), main_ref);
    assert_eq!(ref_text(main, "Parent"), existing_ref);
    // Points at a base node outside the graft; never rewritten.
    assert_eq!(ref_text(util, "Outside"), "RBX6");
}

#[test]
fn test_untouched_regions_are_byte_identical() {
    let before = parse_document(&base_place()).unwrap();
    let mut base = before.clone();
    let overlay = parse_document(&overlay_place()).unwrap();
    let managed_paths = ["ServiceA/Existing", "ServiceA/Other"];

    merge_overlay(&mut base, &overlay, &managed(&managed_paths)).unwrap();

    let original = subtrees_by_path(&before);
    let merged = subtrees_by_path(&base);
    let related = |path: &str| {
        managed_paths.iter().any(|managed| {
            path == *managed
                || path.starts_with(&format!("{}/", managed))
                || managed.starts_with(&format!("{}/", path))
        })
    };
    let mut compared = 0;
    for (path, xml) in &original {
        if related(path) {
            continue;
        }
        assert_eq!(merged.get(path), Some(xml), "subtree at {} changed", path);
        compared += 1;
    }
    assert_eq!(compared, 3, "ServiceB, ServiceB/Untouched, ServiceB/Untouched/Part");

    let written = String::from_utf8(write_document(&base).unwrap()).unwrap();
    assert!(written.starts_with(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<roblox xmlns:xmime=\"http://www.w3.org/2005/05/xmlmime\" version=\"4\">\n  <External>null</External>"
    ));
    assert!(written.ends_with("</roblox>\n"));
}

#[test]
fn test_empty_managed_region_round_trips_exactly() {
    let source = base_place();
    let mut base = parse_document(&source).unwrap();
    // The overlay holds ServiceB/Untouched exactly as the base does.
    let overlay = parse_document(&source).unwrap();

    merge_overlay(&mut base, &overlay, &managed(&["ServiceB/Untouched"])).unwrap();

    let index = PathIndex::build(&base);
    let untouched = index.get("ServiceB/Untouched").unwrap();
    // Every referent collided, so the content matches in shape but not in ids.
    assert_eq!(
        shape(&base, untouched),
        shape(&overlay, PathIndex::build(&overlay).get("ServiceB/Untouched").unwrap())
    );
    assert_ne!(base.referent(untouched).as_deref(), Some("RBX6"));
    // ServiceA was not managed and is untouched.
    assert_eq!(
        subtrees_by_path(&base).get("ServiceA"),
        subtrees_by_path(&overlay).get("ServiceA")
    );
}

#[test]
fn test_merge_is_repeatable() {
    let overlay = parse_document(&overlay_place()).unwrap();
    let managed = managed(&["ServiceA/Existing", "ServiceA/Other"]);

    let mut first = parse_document(&base_place()).unwrap();
    merge_overlay(&mut first, &overlay, &managed).unwrap();
    let mut second = parse_document(&base_place()).unwrap();
    merge_overlay(&mut second, &overlay, &managed).unwrap();

    assert_eq!(write_document(&first).unwrap(), write_document(&second).unwrap());
}
