//! Host CMS file-lookup collaborator
//!
//! The webhook payload references images by media id; the CMS file
//! service resolves an id to an externally-fetchable URL, from which the
//! raw bytes are pulled for variant generation.

use crate::config::TrainerConfig;
use crate::error::{Result, TrainError};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    data: FileRecord,
}

/// Resolved file record (only the public URL is consumed)
#[derive(Debug, Clone, Deserialize)]
pub struct FileRecord {
    pub full_url: String,
}

pub struct CmsFilesClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl CmsFilesClient {
    pub fn new(config: &TrainerConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TrainError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.cms_base_url.trim_end_matches('/').to_string(),
            token: config.cms_token.clone(),
        })
    }

    /// `GET {cms_base_url}/files/{id}` → resolvable public URL.
    pub async fn lookup(&self, file_id: &str) -> Result<FileRecord> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        tracing::debug!(file_id = %file_id, url = %url, "Looking up CMS file");

        let mut request = self.http_client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrainError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TrainError::NotFound(format!("CMS file {}", file_id)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrainError::RemoteRequest {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: FileEnvelope = response
            .json()
            .await
            .map_err(|e| TrainError::Decode(e.to_string()))?;
        Ok(envelope.data)
    }

    /// Fetch the raw bytes behind a resolved URL.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| TrainError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrainError::RemoteRequest {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TrainError::Network(e.to_string()))?;
        tracing::debug!(url = %url, len = bytes.len(), "Fetched image bytes");
        Ok(bytes.to_vec())
    }
}
