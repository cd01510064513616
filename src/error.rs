//! Error types for the placegraft merge and publish pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Tree-document codec errors
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Malformed document: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Document has no root element")]
    MissingRoot,

    #[error("Document has more than one root element (found <{0}> after the root closed)")]
    MultipleRoots(String),

    #[error("Unexpected closing tag </{0}>")]
    UnbalancedTag(String),

    #[error("Document ended inside <{0}>")]
    Unterminated(String),

    #[error("Document I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Project file errors
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Invalid project file (missing tree object)")]
    MissingTree,

    #[error("No managed paths discovered from project file")]
    NoManagedPaths,

    #[error("Managed path '{0}' is a root service; refusing full-service replacement")]
    RootServicePath(String),

    #[error("Failed to parse project file: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Structural merge errors
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Managed path '{0}' is a root service; refusing full-service replacement")]
    RootServicePath(String),

    #[error("Base snapshot is missing required parent path '{parent_path}' while merging '{managed_path}'")]
    MissingParent {
        parent_path: String,
        managed_path: String,
    },
}

/// Publish manifest and prepared manifest errors
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest requires non-empty 'targets' list")]
    EmptyTargets,

    #[error("Manifest target #{0} must be an object")]
    TargetNotObject(usize),

    #[error("Manifest target #{0} requires a non-empty string 'name'")]
    MissingName(usize),

    #[error("Target name '{0}' must not contain a path separator")]
    InvalidName(String),

    #[error("Target '{0}' is declared more than once")]
    DuplicateTarget(String),

    #[error("Target '{0}' is missing required 'placeId'")]
    MissingPlaceId(String),

    #[error("Target '{name}' has invalid placeId: {value}")]
    InvalidPlaceId { name: String, value: String },

    #[error("Target '{name}' has non-positive placeId: {value}")]
    NonPositivePlaceId { name: String, value: i64 },

    #[error("Target '{0}' is missing required 'baseSnapshot'")]
    MissingBaseSnapshot(String),

    #[error("Target '{0}' requires 'projectFile' or recognized 'role'")]
    MissingProjectFile(String),

    #[error("Target '{0}' requires 'buildArtifact' or recognized 'role'")]
    MissingBuildArtifact(String),

    #[error("Target '{0}' requires 'artifactPath'")]
    MissingArtifactPath(String),

    #[error("Target '{name}' {field} does not exist: {path}")]
    FileNotFound {
        name: String,
        field: &'static str,
        path: PathBuf,
    },

    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Publish orchestration errors. Every variant is terminal for the run.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("max attempts must be >= 1")]
    InvalidMaxAttempts,

    #[error("Target '{name}' artifact does not exist: {path}")]
    ArtifactMissing { name: String, path: PathBuf },

    #[error("Failed to read artifact for '{name}' at {path}: {source}")]
    ArtifactRead {
        name: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Publish conflict for {name} (placeId={place_id}) on attempt {attempt}/{max_attempts}. Response: {body}")]
    ConflictExhausted {
        name: String,
        place_id: u64,
        attempt: u32,
        max_attempts: u32,
        body: String,
    },

    #[error("Network error for {name} (placeId={place_id}) on attempt {attempt}/{max_attempts}: {message}")]
    NetworkExhausted {
        name: String,
        place_id: u64,
        attempt: u32,
        max_attempts: u32,
        message: String,
    },

    #[error("Publish failed for {name} (placeId={place_id}) with HTTP {status} on attempt {attempt}/{max_attempts}. Response: {body}")]
    HttpFailure {
        name: String,
        place_id: u64,
        status: u16,
        attempt: u32,
        max_attempts: u32,
        body: String,
    },

    #[error("Failed to build publish client: {0}")]
    ClientSetup(String),
}

/// Umbrella error returned by every pipeline entry point
#[derive(Debug, Error)]
pub enum GraftError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error("Project file {path}: {source}")]
    Project {
        path: PathBuf,
        #[source]
        source: ProjectError,
    },

    #[error("Document {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("Merge failed for target '{target}': {source}")]
    Merge {
        target: String,
        #[source]
        source: MergeError,
    },

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl GraftError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GraftError::IoError {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn manifest(path: impl Into<PathBuf>, source: ManifestError) -> Self {
        GraftError::Manifest {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn document(path: impl Into<PathBuf>, source: DocumentError) -> Self {
        GraftError::Document {
            path: path.into(),
            source,
        }
    }
}

impl From<config::ConfigError> for GraftError {
    fn from(err: config::ConfigError) -> Self {
        GraftError::ConfigError(err.to_string())
    }
}
