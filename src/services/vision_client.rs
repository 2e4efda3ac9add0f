//! Custom Vision training API client
//!
//! Stateless request/response wrapper over the versioned training REST
//! surface. Every request carries the static `Training-Key` header. Every
//! call returns the decoded body or a typed failure with the HTTP status
//! and remote error body. Retry policy lives in the coordinator, not here.

use crate::config::TrainerConfig;
use crate::error::{Result, TrainError};
use crate::models::{Iteration, Tag, TaggedImage};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Authenticated client bound to one training project
pub struct CustomVisionClient {
    http_client: reqwest::Client,
    training_endpoint: String,
}

impl CustomVisionClient {
    pub fn new(config: &TrainerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.training_key)
            .map_err(|e| TrainError::Config(format!("invalid training key: {}", e)))?;
        headers.insert("Training-Key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TrainError::Network(e.to_string()))?;

        tracing::debug!(endpoint = %config.training_endpoint(), "Created training API client");

        Ok(Self {
            http_client,
            training_endpoint: config.training_endpoint(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.training_endpoint, path)
    }

    /// Map a response to the error taxonomy: 404 becomes `NotFound`,
    /// any other non-2xx becomes `RemoteRequest` with status and body.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(TrainError::NotFound(body));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrainError::RemoteRequest {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::check(response).await?;
        response
            .json()
            .await
            .map_err(|e| TrainError::Decode(e.to_string()))
    }

    async fn discard(response: reqwest::Response) -> Result<()> {
        Self::check(response).await?;
        Ok(())
    }

    fn network(e: reqwest::Error) -> TrainError {
        TrainError::Network(e.to_string())
    }

    /// `POST /tags?name=` — fails with `RemoteRequest` on a duplicate name.
    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        let response = self
            .http_client
            .post(self.url("/tags"))
            .query(&[("name", name)])
            .send()
            .await
            .map_err(Self::network)?;

        Self::decode(response).await
    }

    /// `DELETE /tags/{id}`
    pub async fn delete_tag(&self, tag_id: &str) -> Result<()> {
        let response = self
            .http_client
            .delete(self.url(&format!("/tags/{}", tag_id)))
            .send()
            .await
            .map_err(Self::network)?;

        Self::discard(response).await
    }

    /// `GET /tags`
    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let response = self
            .http_client
            .get(self.url("/tags"))
            .send()
            .await
            .map_err(Self::network)?;

        Self::decode(response).await
    }

    /// `POST /images/urls` — submit externally-fetchable URLs under a tag.
    pub async fn upload_image_urls(&self, urls: &[String], tag_id: &str) -> Result<()> {
        let body = json!({
            "images": urls.iter().map(|url| json!({ "url": url })).collect::<Vec<_>>(),
            "tagIds": [tag_id],
        });

        let response = self
            .http_client
            .post(self.url("/images/urls"))
            .json(&body)
            .send()
            .await
            .map_err(Self::network)?;

        Self::discard(response).await
    }

    /// `POST /images/files` — submit inline base64 payloads in one batch.
    pub async fn upload_image_files(&self, contents: &[String], tag_id: &str) -> Result<()> {
        let body = json!({
            "images": contents
                .iter()
                .map(|encoded| json!({ "contents": encoded }))
                .collect::<Vec<_>>(),
            "tagIds": [tag_id],
        });

        let response = self
            .http_client
            .post(self.url("/images/files"))
            .json(&body)
            .send()
            .await
            .map_err(Self::network)?;

        Self::discard(response).await
    }

    /// `GET /images/tagged?tagIds=` — images currently under a tag.
    pub async fn list_tagged_images(&self, tag_id: &str) -> Result<Vec<TaggedImage>> {
        let response = self
            .http_client
            .get(self.url("/images/tagged"))
            .query(&[("tagIds", tag_id)])
            .send()
            .await
            .map_err(Self::network)?;

        Self::decode(response).await
    }

    /// `DELETE /images?imageIds=` — no-op locally when the id list is empty.
    pub async fn delete_images(&self, image_ids: &[String]) -> Result<()> {
        if image_ids.is_empty() {
            return Ok(());
        }

        let response = self
            .http_client
            .delete(self.url("/images"))
            .query(&[("imageIds", image_ids.join(","))])
            .send()
            .await
            .map_err(Self::network)?;

        Self::discard(response).await
    }

    /// `POST /train[?forceTrain=true]` — request a new iteration.
    pub async fn train(&self, force: bool) -> Result<Iteration> {
        let mut request = self.http_client.post(self.url("/train"));
        if force {
            request = request.query(&[("forceTrain", "true")]);
        }

        let response = request.send().await.map_err(Self::network)?;
        Self::decode(response).await
    }

    /// `GET /iterations/{id}`
    pub async fn get_iteration(&self, iteration_id: &str) -> Result<Iteration> {
        let response = self
            .http_client
            .get(self.url(&format!("/iterations/{}", iteration_id)))
            .send()
            .await
            .map_err(Self::network)?;

        Self::decode(response).await
    }

    /// `GET /iterations`
    pub async fn list_iterations(&self) -> Result<Vec<Iteration>> {
        let response = self
            .http_client
            .get(self.url("/iterations"))
            .send()
            .await
            .map_err(Self::network)?;

        Self::decode(response).await
    }

    /// `POST /iterations/{id}/publish?publishName=&predictionId=`
    pub async fn publish_iteration(
        &self,
        iteration_id: &str,
        publish_name: &str,
        prediction_resource_id: &str,
    ) -> Result<()> {
        let response = self
            .http_client
            .post(self.url(&format!("/iterations/{}/publish", iteration_id)))
            .query(&[
                ("publishName", publish_name),
                ("predictionId", prediction_resource_id),
            ])
            .send()
            .await
            .map_err(Self::network)?;

        Self::discard(response).await
    }

    /// `DELETE /iterations/{id}/publish`
    pub async fn unpublish_iteration(&self, iteration_id: &str) -> Result<()> {
        let response = self
            .http_client
            .delete(self.url(&format!("/iterations/{}/publish", iteration_id)))
            .send()
            .await
            .map_err(Self::network)?;

        Self::discard(response).await
    }

    /// `DELETE /iterations/{id}` — reclaims iteration-slot quota.
    pub async fn delete_iteration(&self, iteration_id: &str) -> Result<()> {
        let response = self
            .http_client
            .delete(self.url(&format!("/iterations/{}", iteration_id)))
            .send()
            .await
            .map_err(Self::network)?;

        Self::discard(response).await
    }
}
