//! Publish Orchestrator
//!
//! Uploads prepared place files one target at a time. Version conflicts and
//! transport failures are retried with a linearly growing delay up to a bounded
//! number of attempts; any other HTTP failure ends the run immediately.

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::manifest::{PlaceId, PreparedManifest, PreparedTarget};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub mod open_cloud;

pub use open_cloud::OpenCloudClient;

/// Successful upload response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub status: u16,
    pub body: String,
}

impl UploadResponse {
    /// `versionNumber` from a JSON body, if there is one
    pub fn version_number(&self) -> Option<u64> {
        serde_json::from_str::<Value>(&self.body)
            .ok()?
            .get("versionNumber")?
            .as_u64()
    }
}

/// Failed upload, classified by how the orchestrator reacts to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Another writer published concurrently (HTTP 409)
    Conflict { body: String },
    /// Any other non-success status
    Http { status: u16, body: String },
    /// The request never produced a response
    Network(String),
}

/// Versioned-upload endpoint keyed by place id
#[async_trait]
pub trait PublishEndpoint: Send + Sync {
    async fn upload(&self, place_id: PlaceId, body: &[u8]) -> Result<UploadResponse, UploadError>;
}

/// Why an attempt is being retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    Conflict,
    Network,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Conflict => write!(f, "conflict"),
            RetryReason::Network => write!(f, "network error"),
        }
    }
}

/// Bounded retry schedule. The delay before retry `k` is `k × backoff` for the
/// failure class of attempt `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    conflict_backoff: Duration,
    network_backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
    pub const DEFAULT_CONFLICT_BACKOFF: Duration = Duration::from_secs(20);
    pub const DEFAULT_NETWORK_BACKOFF: Duration = Duration::from_secs(10);

    pub fn new(max_attempts: u32) -> Result<Self, PublishError> {
        if max_attempts == 0 {
            return Err(PublishError::InvalidMaxAttempts);
        }
        Ok(Self {
            max_attempts,
            conflict_backoff: Self::DEFAULT_CONFLICT_BACKOFF,
            network_backoff: Self::DEFAULT_NETWORK_BACKOFF,
        })
    }

    pub fn from_config(config: &PublishConfig) -> Result<Self, PublishError> {
        Ok(Self::new(config.max_attempts)?.with_backoff(
            Duration::from_secs(config.conflict_backoff_secs),
            Duration::from_secs(config.network_backoff_secs),
        ))
    }

    pub fn with_backoff(mut self, conflict: Duration, network: Duration) -> Self {
        self.conflict_backoff = conflict;
        self.network_backoff = network;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self, reason: RetryReason, attempt: u32) -> Duration {
        let unit = match reason {
            RetryReason::Conflict => self.conflict_backoff,
            RetryReason::Network => self.network_backoff,
        };
        unit.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            conflict_backoff: Self::DEFAULT_CONFLICT_BACKOFF,
            network_backoff: Self::DEFAULT_NETWORK_BACKOFF,
        }
    }
}

/// Orchestrator state transitions, in the order they happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishState {
    Attempting { attempt: u32 },
    Retrying { attempt: u32, delay: Duration, reason: RetryReason },
    Succeeded { attempts: u32, version: Option<u64> },
    Failed { attempt: u32 },
}

/// Result of publishing one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub name: String,
    pub place_id: PlaceId,
    pub attempts: u32,
    pub version_number: Option<u64>,
    pub response_body: String,
    pub history: Vec<PublishState>,
}

impl PublishOutcome {
    /// One-line success message; falls back to the raw body without a version
    pub fn summary(&self) -> String {
        match self.version_number {
            Some(version) => format!(
                "Published {} (placeId={}) version {}",
                self.name, self.place_id, version
            ),
            None => format!(
                "Published {} (placeId={}). Response: {}",
                self.name, self.place_id, self.response_body
            ),
        }
    }
}

/// Publish `body` to one place, retrying conflicts and network errors
#[instrument(skip(endpoint, policy, body), fields(bytes = body.len()))]
pub async fn publish_target(
    endpoint: &dyn PublishEndpoint,
    policy: &RetryPolicy,
    name: &str,
    place_id: PlaceId,
    body: &[u8],
) -> Result<PublishOutcome, PublishError> {
    let max_attempts = policy.max_attempts();
    let mut history = Vec::new();

    for attempt in 1..=max_attempts {
        history.push(PublishState::Attempting { attempt });
        info!(attempt, max_attempts, "Uploading place");

        let (reason, detail) = match endpoint.upload(place_id, body).await {
            Ok(response) => {
                let version = response.version_number();
                history.push(PublishState::Succeeded {
                    attempts: attempt,
                    version,
                });
                let outcome = PublishOutcome {
                    name: name.to_string(),
                    place_id,
                    attempts: attempt,
                    version_number: version,
                    response_body: response.body,
                    history,
                };
                info!(attempt, version = ?version, "Publish succeeded");
                return Ok(outcome);
            }
            Err(UploadError::Http { status, body }) => {
                history.push(PublishState::Failed { attempt });
                return Err(PublishError::HttpFailure {
                    name: name.to_string(),
                    place_id: place_id.get(),
                    status,
                    attempt,
                    max_attempts,
                    body,
                });
            }
            Err(UploadError::Conflict { body }) => (RetryReason::Conflict, body),
            Err(UploadError::Network(message)) => (RetryReason::Network, message),
        };

        if attempt == max_attempts {
            history.push(PublishState::Failed { attempt });
            return Err(match reason {
                RetryReason::Conflict => PublishError::ConflictExhausted {
                    name: name.to_string(),
                    place_id: place_id.get(),
                    attempt,
                    max_attempts,
                    body: detail,
                },
                RetryReason::Network => PublishError::NetworkExhausted {
                    name: name.to_string(),
                    place_id: place_id.get(),
                    attempt,
                    max_attempts,
                    message: detail,
                },
            });
        }

        let delay = policy.delay(reason, attempt);
        history.push(PublishState::Retrying {
            attempt,
            delay,
            reason,
        });
        warn!(
            attempt,
            max_attempts,
            reason = %reason,
            delay_secs = delay.as_secs_f64(),
            detail = %detail,
            "Publish attempt failed; retrying"
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    // The loop always returns on its last attempt.
    Err(PublishError::InvalidMaxAttempts)
}

/// Read a prepared target's artifact. Relative paths resolve against `workspace_root`.
pub fn read_artifact(target: &PreparedTarget, workspace_root: &Path) -> Result<Vec<u8>, PublishError> {
    let path = if target.artifact_path.is_absolute() {
        target.artifact_path.clone()
    } else {
        workspace_root.join(&target.artifact_path)
    };
    if !path.is_file() {
        return Err(PublishError::ArtifactMissing {
            name: target.name.clone(),
            path,
        });
    }
    std::fs::read(&path).map_err(|source| PublishError::ArtifactRead {
        name: target.name.clone(),
        path,
        source,
    })
}

/// Publish every prepared target in order, stopping at the first fatal error
pub async fn publish_prepared(
    endpoint: &dyn PublishEndpoint,
    policy: &RetryPolicy,
    manifest: &PreparedManifest,
    workspace_root: &Path,
) -> Result<Vec<PublishOutcome>, PublishError> {
    let mut outcomes = Vec::with_capacity(manifest.targets.len());
    for target in &manifest.targets {
        let body = read_artifact(target, workspace_root)?;
        let outcome = publish_target(endpoint, policy, &target.name, target.place_id, &body).await?;
        info!("{}", outcome.summary());
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
