//! End-to-end merge stage: manifest in, merged places and prepared manifest out

use crate::integration::test_utils::{item, place, project_json, TestWorkspace};
use placegraft::error::{GraftError, ManifestError, MergeError};
use placegraft::manifest::PreparedManifest;
use placegraft::prepare::{prepare_targets, PrepareRequest};
use placegraft::tree::{load_document, PathIndex};
use std::path::PathBuf;

fn base_snapshot() -> String {
    place(&[
        item(
            "ReplicatedStorage",
            "ReplicatedStorage",
            "RBX10",
            "",
            &format!(
                "{}{}",
                item("Folder", "Shared", "RBX11", "", &item("ModuleScript", "Stale", "RBX12", "", "")),
                item("Folder", "Assets", "RBX13", "", "")
            ),
        ),
        item("Workspace", "Workspace", "RBX14", "", &item("Part", "Baseplate", "RBX15", "", "")),
    ])
}

fn build_artifact() -> String {
    place(&[item(
        "ReplicatedStorage",
        "ReplicatedStorage",
        "RBX1",
        "",
        &item("Folder", "Shared", "RBX2", "", &item("ModuleScript", "Fresh", "RBX11", "", "")),
    )])
}

fn request(ws: &TestWorkspace) -> PrepareRequest {
    PrepareRequest {
        workspace_root: ws.root().to_path_buf(),
        manifest: PathBuf::from("publish/targets.json"),
        output_dir: PathBuf::from("build/places"),
        prepared_manifest: PathBuf::from("build/prepared.json"),
    }
}

#[test]
fn test_role_defaults_drive_the_merge() {
    let ws = TestWorkspace::new();
    ws.write("places/lobby.rbxlx", &base_snapshot());
    ws.write("game/places/lobby/default.project.json", &project_json(&["ReplicatedStorage/Shared"]));
    ws.write("artifacts/lobby-place.rbxlx", &build_artifact());
    ws.write(
        "publish/targets.json",
        r#"{ "targets": [ { "name": "lobby", "role": "lobby", "placeId": "1234", "baseSnapshot": "places/lobby.rbxlx" } ] }"#,
    );

    let outputs = prepare_targets(&request(&ws)).unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].report.grafted, vec!["ReplicatedStorage/Shared"]);

    let merged = load_document(&ws.root().join("build/places/lobby.rbxlx")).unwrap();
    let index = PathIndex::build(&merged);
    assert!(index.contains("ReplicatedStorage/Shared/Fresh"));
    assert!(!index.contains("ReplicatedStorage/Shared/Stale"));
    assert!(index.contains("ReplicatedStorage/Assets"));
    assert!(index.contains("Workspace/Baseplate"));

    let prepared = PreparedManifest::load(&ws.root().join("build/prepared.json")).unwrap();
    assert_eq!(prepared.targets.len(), 1);
    assert_eq!(prepared.targets[0].name, "lobby");
    assert_eq!(prepared.targets[0].place_id.get(), 1234);
    assert_eq!(prepared.targets[0].artifact_path, PathBuf::from("build/places/lobby.rbxlx"));

    let text = ws.read("build/prepared.json");
    assert!(text.contains("\"placeId\": 1234"));
    assert!(text.ends_with('\n'));
}

#[test]
fn test_targets_keep_manifest_order() {
    let ws = TestWorkspace::new();
    ws.write("places/base.rbxlx", &base_snapshot());
    ws.write("shared.project.json", &project_json(&["ReplicatedStorage/Shared"]));
    ws.write("out/build.rbxlx", &build_artifact());
    ws.write(
        "publish/targets.json",
        r#"{ "targets": [
            { "name": "match", "placeId": 2, "baseSnapshot": "places/base.rbxlx", "projectFile": "shared.project.json", "buildArtifact": "out/build.rbxlx" },
            { "name": "lobby", "placeId": 1, "baseSnapshot": "places/base.rbxlx", "projectFile": "shared.project.json", "buildArtifact": "out/build.rbxlx" }
        ] }"#,
    );

    prepare_targets(&request(&ws)).unwrap();

    let prepared = PreparedManifest::load(&ws.root().join("build/prepared.json")).unwrap();
    let names: Vec<&str> = prepared.targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["match", "lobby"]);
    assert!(ws.root().join("build/places/match.rbxlx").is_file());
    assert!(ws.root().join("build/places/lobby.rbxlx").is_file());
}

#[test]
fn test_missing_parent_aborts_without_prepared_manifest() {
    let ws = TestWorkspace::new();
    ws.write("places/lobby.rbxlx", &base_snapshot());
    ws.write("game/places/lobby/default.project.json", &project_json(&["ServerStorage/Maps"]));
    ws.write("artifacts/lobby-place.rbxlx", &build_artifact());
    ws.write(
        "publish/targets.json",
        r#"{ "targets": [ { "name": "lobby", "role": "lobby", "placeId": 9, "baseSnapshot": "places/lobby.rbxlx" } ] }"#,
    );

    match prepare_targets(&request(&ws)) {
        Err(GraftError::Merge {
            target,
            source: MergeError::MissingParent { parent_path, .. },
        }) => {
            assert_eq!(target, "lobby");
            assert_eq!(parent_path, "ServerStorage");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!ws.root().join("build/prepared.json").exists());
}

#[test]
fn test_missing_input_file_is_reported_by_field() {
    let ws = TestWorkspace::new();
    ws.write("places/lobby.rbxlx", &base_snapshot());
    ws.write(
        "publish/targets.json",
        r#"{ "targets": [ { "name": "lobby", "role": "lobby", "placeId": 9, "baseSnapshot": "places/lobby.rbxlx" } ] }"#,
    );

    match prepare_targets(&request(&ws)) {
        Err(GraftError::Manifest {
            source: ManifestError::FileNotFound { field, .. },
            ..
        }) => assert_eq!(field, "projectFile"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_malformed_base_snapshot_names_the_file() {
    let ws = TestWorkspace::new();
    ws.write("places/lobby.rbxlx", "<roblox><Item></roblox>");
    ws.write("game/places/lobby/default.project.json", &project_json(&["ReplicatedStorage/Shared"]));
    ws.write("artifacts/lobby-place.rbxlx", &build_artifact());
    ws.write(
        "publish/targets.json",
        r#"{ "targets": [ { "name": "lobby", "role": "lobby", "placeId": 9, "baseSnapshot": "places/lobby.rbxlx" } ] }"#,
    );

    match prepare_targets(&request(&ws)) {
        Err(GraftError::Document { path, .. }) => assert!(path.ends_with("places/lobby.rbxlx")),
        other => panic!("unexpected result: {:?}", other),
    }
}
