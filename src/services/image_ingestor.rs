//! Image submission under a tag
//!
//! Images go up either by externally-resolvable URL or as inline base64
//! payloads. The content path expands one source photo into geometric
//! variants (see `variants`) and submits them all in a single batch call,
//! which is how the remote minimum-image-count requirement is satisfied
//! from a single photograph.

use crate::error::Result;
use crate::services::variants;
use crate::services::vision_client::CustomVisionClient;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;

pub struct ImageIngestor<'a> {
    client: &'a CustomVisionClient,
}

impl<'a> ImageIngestor<'a> {
    pub fn new(client: &'a CustomVisionClient) -> Self {
        Self { client }
    }

    /// Submit a single externally-fetchable URL tagged with `tag_id`.
    pub async fn ingest_by_url(&self, tag_id: &str, image_url: &str) -> Result<()> {
        debug!(tag_id = %tag_id, url = %image_url, "Ingesting image by URL");
        self.client
            .upload_image_urls(&[image_url.to_string()], tag_id)
            .await
    }

    /// Expand raw bytes into one variant per angle and submit them all in
    /// one batch call tagged with `tag_id`.
    pub async fn ingest_by_content(
        &self,
        tag_id: &str,
        image_bytes: &[u8],
        variant_angles: &[f32],
    ) -> Result<()> {
        debug!(
            tag_id = %tag_id,
            source_len = image_bytes.len(),
            variants = variant_angles.len(),
            "Ingesting image content with variants"
        );

        let encoded: Vec<String> = variants::generate_variants(image_bytes, variant_angles)?
            .iter()
            .map(|png| BASE64.encode(png))
            .collect();

        self.client.upload_image_files(&encoded, tag_id).await?;
        debug!(tag_id = %tag_id, count = encoded.len(), "Variant batch uploaded");
        Ok(())
    }
}
