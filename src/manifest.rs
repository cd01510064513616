//! Publish manifests
//!
//! The publish manifest declares which base snapshots receive which build
//! artifacts. The merge stage turns it into a prepared manifest, the only thing
//! the publish stage reads.

use crate::error::{GraftError, ManifestError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Positive numeric place identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceId(u64);

impl PlaceId {
    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Accept an integer or a numeric string, rejecting anything not positive
    fn from_json(name: &str, value: &Value) -> Result<Self, ManifestError> {
        let invalid = || ManifestError::InvalidPlaceId {
            name: name.to_string(),
            value: value.to_string(),
        };
        let parsed: i128 = match value {
            Value::Number(number) => number
                .as_i64()
                .map(i128::from)
                .or_else(|| number.as_u64().map(i128::from))
                .ok_or_else(invalid)?,
            Value::String(text) => text.trim().parse::<i128>().map_err(|_| invalid())?,
            _ => return Err(invalid()),
        };
        if parsed <= 0 {
            return Err(ManifestError::NonPositivePlaceId {
                name: name.to_string(),
                value: i64::try_from(parsed).unwrap_or(i64::MIN),
            });
        }
        u64::try_from(parsed).map(Self).map_err(|_| invalid())
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Place roles with default project file and build artifact locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Lobby,
    Match,
}

/// Default inputs of a role, relative to the workspace root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleDefaults {
    pub project_file: &'static str,
    pub build_artifact: &'static str,
}

impl Role {
    pub fn defaults(self) -> RoleDefaults {
        match self {
            Role::Lobby => RoleDefaults {
                project_file: "game/places/lobby/default.project.json",
                build_artifact: "artifacts/lobby-place.rbxlx",
            },
            Role::Match => RoleDefaults {
                project_file: "game/places/match/default.project.json",
                build_artifact: "artifacts/match-place.rbxlx",
            },
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lobby" => Ok(Role::Lobby),
            "match" => Ok(Role::Match),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Defaults for a role name; `None` when the role is not recognized
pub fn role_defaults(role: &str) -> Option<RoleDefaults> {
    role.parse::<Role>().ok().map(Role::defaults)
}

/// Target entry as written in the publish manifest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTarget {
    name: Option<Value>,
    role: Option<String>,
    place_id: Option<Value>,
    base_snapshot: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    project_file: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    build_artifact: Option<Value>,
}

/// Keep an explicit `null` as `Some(Value::Null)` so it is not mistaken for an absent field
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// A fully resolved merge target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub name: String,
    pub place_id: PlaceId,
    pub base_snapshot: PathBuf,
    pub project_file: PathBuf,
    pub build_artifact: PathBuf,
}

/// Handoff record between the merge and publish stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTarget {
    pub name: String,
    pub place_id: PlaceId,
    pub artifact_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedManifest {
    pub targets: Vec<PreparedTarget>,
}

fn non_empty_string(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn target_list(document: &Value) -> Result<&Vec<Value>, ManifestError> {
    document
        .get("targets")
        .and_then(Value::as_array)
        .filter(|targets| !targets.is_empty())
        .ok_or(ManifestError::EmptyTargets)
}

/// Parse and validate the publish manifest, resolving every path against
/// `workspace_root` and checking that each input file exists
pub fn parse_manifest(text: &str, workspace_root: &Path) -> Result<Vec<PublishTarget>, ManifestError> {
    let document: Value = serde_json::from_str(text)?;
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for (index, entry) in target_list(&document)?.iter().enumerate() {
        if !entry.is_object() {
            return Err(ManifestError::TargetNotObject(index));
        }
        let raw: RawTarget = serde_json::from_value(entry.clone())?;
        let target = resolve_target(index, raw, workspace_root)?;
        if !seen.insert(target.name.clone()) {
            return Err(ManifestError::DuplicateTarget(target.name));
        }
        resolved.push(target);
    }
    Ok(resolved)
}

fn resolve_target(
    index: usize,
    raw: RawTarget,
    workspace_root: &Path,
) -> Result<PublishTarget, ManifestError> {
    let name = non_empty_string(raw.name.as_ref())
        .ok_or(ManifestError::MissingName(index))?
        .to_string();
    if name.contains('/') || name.contains('\\') {
        return Err(ManifestError::InvalidName(name));
    }

    let defaults = raw.role.as_deref().and_then(|role| {
        let defaults = role_defaults(role);
        if defaults.is_none() {
            warn!(target_name = %name, role, "Unrecognized role; no defaults applied");
        }
        defaults
    });

    let place_id = match raw.place_id.as_ref() {
        None | Some(Value::Null) => return Err(ManifestError::MissingPlaceId(name)),
        Some(value) => PlaceId::from_json(&name, value)?,
    };

    let base_snapshot = non_empty_string(raw.base_snapshot.as_ref())
        .ok_or_else(|| ManifestError::MissingBaseSnapshot(name.clone()))?;

    // An explicit field wins over the role default, even when it is invalid.
    let project_file = match raw.project_file.as_ref() {
        Some(value) => non_empty_string(Some(value)),
        None => defaults.map(|d| d.project_file),
    }
    .ok_or_else(|| ManifestError::MissingProjectFile(name.clone()))?;
    let build_artifact = match raw.build_artifact.as_ref() {
        Some(value) => non_empty_string(Some(value)),
        None => defaults.map(|d| d.build_artifact),
    }
    .ok_or_else(|| ManifestError::MissingBuildArtifact(name.clone()))?;

    Ok(PublishTarget {
        base_snapshot: existing_file(&name, "baseSnapshot", workspace_root, base_snapshot)?,
        project_file: existing_file(&name, "projectFile", workspace_root, project_file)?,
        build_artifact: existing_file(&name, "buildArtifact", workspace_root, build_artifact)?,
        name,
        place_id,
    })
}

fn existing_file(
    name: &str,
    field: &'static str,
    workspace_root: &Path,
    relative: &str,
) -> Result<PathBuf, ManifestError> {
    let path = workspace_root.join(relative);
    if !path.is_file() {
        return Err(ManifestError::FileNotFound {
            name: name.to_string(),
            field,
            path: PathBuf::from(relative),
        });
    }
    Ok(dunce::canonicalize(&path).unwrap_or(path))
}

/// Load the publish manifest from disk
pub fn load_manifest(path: &Path, workspace_root: &Path) -> Result<Vec<PublishTarget>, GraftError> {
    let text = std::fs::read_to_string(path).map_err(|e| GraftError::io(path, e))?;
    parse_manifest(&text, workspace_root).map_err(|e| GraftError::manifest(path, e))
}

impl PreparedManifest {
    /// Parse and validate a prepared manifest
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let document: Value = serde_json::from_str(text)?;
        let mut targets = Vec::new();
        for (index, entry) in target_list(&document)?.iter().enumerate() {
            if !entry.is_object() {
                return Err(ManifestError::TargetNotObject(index));
            }
            let name = match entry.get("name") {
                Some(Value::String(name)) if !name.is_empty() => name.clone(),
                Some(Value::Number(number)) => number.to_string(),
                _ => return Err(ManifestError::MissingName(index)),
            };
            let place_id = match entry.get("placeId") {
                None | Some(Value::Null) => return Err(ManifestError::MissingPlaceId(name)),
                Some(Value::String(text)) if text.is_empty() => {
                    return Err(ManifestError::MissingPlaceId(name))
                }
                Some(value) => PlaceId::from_json(&name, value)?,
            };
            let artifact_path = non_empty_string(entry.get("artifactPath"))
                .ok_or_else(|| ManifestError::MissingArtifactPath(name.clone()))?;
            targets.push(PreparedTarget {
                name,
                place_id,
                artifact_path: PathBuf::from(artifact_path),
            });
        }
        Ok(Self { targets })
    }

    pub fn load(path: &Path) -> Result<Self, GraftError> {
        let text = std::fs::read_to_string(path).map_err(|e| GraftError::io(path, e))?;
        Self::parse(&text).map_err(|e| GraftError::manifest(path, e))
    }

    /// Write as pretty JSON with a trailing newline, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), GraftError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GraftError::io(parent, e))?;
        }
        let mut text = serde_json::to_string_pretty(self)
            .map_err(|e| GraftError::manifest(path, ManifestError::ParseError(e)))?;
        text.push('\n');
        std::fs::write(path, text).map_err(|e| GraftError::io(path, e))
    }
}
