//! Tag lifecycle: creation with disambiguated names, idempotent cleanup
//!
//! Cleanup ordering invariant: images are deleted before their tag, never
//! the reverse, so the remote service is never left with orphaned images
//! under a dangling tag reference.

use crate::error::Result;
use crate::models::{Artwork, Tag};
use crate::services::vision_client::CustomVisionClient;
use tracing::{debug, warn};

/// Short uniqueness token appended to derived tag names so repeated
/// submissions of the same artwork never collide on the remote side.
fn disambiguator() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Derive a tag name from artwork attributes plus a uniqueness token.
///
/// Only the pre-persist filter stage uses this form: the entity id is
/// not assigned yet at that point. Everywhere the id is known,
/// `tag_name_with_id` is used instead.
pub fn tag_name(artist_name: &str, title: &str) -> String {
    format!("{} - {} ({})", artist_name, title, disambiguator())
}

/// Derive the full tag name, prefixed with the entity id.
pub fn tag_name_with_id(artwork_id: i64, artist_name: &str, title: &str) -> String {
    format!(
        "{}: {} - {} ({})",
        artwork_id,
        artist_name,
        title,
        disambiguator()
    )
}

/// Creates and deletes classification tags bound 1:1 to an artwork
pub struct TagManager<'a> {
    client: &'a CustomVisionClient,
}

impl<'a> TagManager<'a> {
    pub fn new(client: &'a CustomVisionClient) -> Self {
        Self { client }
    }

    /// Create a tag; a duplicate name surfaces as `RemoteRequest`.
    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        debug!(name = %name, "Creating tag");
        let tag = self.client.create_tag(name).await?;
        debug!(tag_id = %tag.id, "Tag created");
        Ok(tag)
    }

    /// Create a tag named after the artwork's id, artist, and title.
    pub async fn create_tag_for_artwork(&self, artwork: &Artwork) -> Result<Tag> {
        let name = tag_name_with_id(artwork.id, &artwork.artist_name, &artwork.title);
        debug!(artwork_id = artwork.id, name = %name, "Creating tag for artwork");
        self.create_tag(&name).await
    }

    /// Delete the images under a tag, then the tag itself.
    ///
    /// Idempotent: the triggering delete event may fire more than once or
    /// race a prior cleanup, so a missing tag or missing images are logged
    /// and treated as a no-op.
    pub async fn delete_tag_and_images(&self, tag_id: &str) -> Result<()> {
        debug!(tag_id = %tag_id, "Deleting tag and its images");

        let images = match self.client.list_tagged_images(tag_id).await {
            Ok(images) => images,
            Err(e) if e.is_not_found() => {
                warn!(tag_id = %tag_id, "Tag has no image listing (already deleted?)");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let image_ids: Vec<String> = images.into_iter().map(|image| image.id).collect();
        match self.client.delete_images(&image_ids).await {
            Ok(()) => debug!(tag_id = %tag_id, count = image_ids.len(), "Deleted tagged images"),
            Err(e) if e.is_not_found() => {
                warn!(tag_id = %tag_id, "Images already deleted, continuing cleanup");
            }
            Err(e) => return Err(e),
        }

        match self.client.delete_tag(tag_id).await {
            Ok(()) => {
                debug!(tag_id = %tag_id, "Tag deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(tag_id = %tag_id, "Tag already deleted, treating as no-op");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
