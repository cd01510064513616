//! Open Cloud place-publishing client

use super::{PublishEndpoint, UploadError, UploadResponse};
use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::manifest::PlaceId;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const PLACE_CONTENT_TYPE: &str = "application/xml";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP endpoint publishing place versions for one universe
pub struct OpenCloudClient {
    client: Client,
    api_base: String,
    universe_id: u64,
    api_key: String,
}

impl fmt::Debug for OpenCloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenCloudClient")
            .field("api_base", &self.api_base)
            .field("universe_id", &self.universe_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenCloudClient {
    pub fn new(
        api_base: impl Into<String>,
        universe_id: u64,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, PublishError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
            .timeout(request_timeout)
            .build()
            .map_err(|e| PublishError::ClientSetup(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            universe_id,
            api_key: api_key.into(),
        })
    }

    pub fn from_config(
        config: &PublishConfig,
        universe_id: u64,
        api_key: impl Into<String>,
    ) -> Result<Self, PublishError> {
        Self::new(
            config.api_base.clone(),
            universe_id,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn version_url(&self, place_id: PlaceId) -> String {
        format!(
            "{}/universes/v1/{}/places/{}/versions?versionType=Published",
            self.api_base, self.universe_id, place_id
        )
    }
}

#[async_trait]
impl PublishEndpoint for OpenCloudClient {
    async fn upload(&self, place_id: PlaceId, body: &[u8]) -> Result<UploadResponse, UploadError> {
        let url = self.version_url(place_id);
        debug!(url = %url, bytes = body.len(), "POST place version");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, PLACE_CONTENT_TYPE)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        // A received status is final; a 2xx is committed even if the body is cut short.
        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    status = status.as_u16(),
                    error = %e,
                    "Failed to read upload response body; classifying by status alone"
                );
                String::new()
            }
        };

        if status.is_success() {
            Ok(UploadResponse {
                status: status.as_u16(),
                body: text,
            })
        } else if status == StatusCode::CONFLICT {
            Err(UploadError::Conflict { body: text })
        } else {
            Err(UploadError::Http {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}
