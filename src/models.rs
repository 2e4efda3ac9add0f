//! Local entity, remote wire types, and webhook payloads
//!
//! Remote types mirror the Custom Vision training API JSON, which uses
//! camelCase field names (`trainedAt`, `publishName`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entity status value the host CMS uses for soft deletion
pub const STATUS_DELETED: &str = "deleted";

/// Artwork record as delivered by the host CMS on create
///
/// Owned by the CMS; this service only reads it and hands back `tag_id`
/// through the create filter hook.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Artwork {
    pub id: i64,
    pub artist_name: String,
    pub title: String,
    /// Media reference into the CMS file store
    #[serde(default)]
    pub image: Option<String>,
    /// Remote classification tag bound to this artwork; the host CMS
    /// persists it under `image_recognition_tag_id`
    #[serde(default, alias = "image_recognition_tag_id")]
    pub tag_id: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_string()
}

impl Artwork {
    pub fn is_deleted(&self) -> bool {
        self.status == STATUS_DELETED
    }
}

/// Update event payload: changed fields plus identity and status
///
/// The host delivers only the fields that changed, so everything except
/// `id` is optional. For `image` the field's presence itself is the
/// signal: absent means unchanged, an explicit `null` means the image
/// was removed, a string means it was replaced. The double `Option`
/// keeps those three states apart.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtworkUpdate {
    pub id: i64,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "field_presence",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<Option<String>>,
    #[serde(default, alias = "image_recognition_tag_id")]
    pub tag_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Wrap a field's value in `Some` so that an absent field (outer `None`)
/// stays distinguishable from an explicit `null` (`Some(None)`).
fn field_presence<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl ArtworkUpdate {
    pub fn is_deleted(&self) -> bool {
        self.status.as_deref() == Some(STATUS_DELETED)
    }

    /// True when the change-set contains the `image` field at all.
    pub fn image_changed(&self) -> bool {
        self.image.is_some()
    }

    /// The replacement image id, when the image was changed to one.
    pub fn new_image(&self) -> Option<&str> {
        self.image.as_ref().and_then(|inner| inner.as_deref())
    }
}

/// Remote classification tag
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tag {
    /// Opaque identifier assigned by the remote service
    pub id: String,
    pub name: String,
}

/// Remote image record (only the id is consumed locally)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaggedImage {
    pub id: String,
}

/// Training-run status reported by the remote service
///
/// Anything outside the known set is kept verbatim in `Other` so an
/// unexpected terminal value never panics the poll loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IterationStatus {
    Training,
    Completed,
    Failed,
    Other(String),
}

impl From<String> for IterationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Training" => IterationStatus::Training,
            "Completed" => IterationStatus::Completed,
            "Failed" => IterationStatus::Failed,
            _ => IterationStatus::Other(value),
        }
    }
}

impl From<IterationStatus> for String {
    fn from(status: IterationStatus) -> Self {
        match status {
            IterationStatus::Training => "Training".to_string(),
            IterationStatus::Completed => "Completed".to_string(),
            IterationStatus::Failed => "Failed".to_string(),
            IterationStatus::Other(value) => value,
        }
    }
}

/// Remote training run
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: IterationStatus,
    /// Set once training finished; used to find the most recent run
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    /// Set while the iteration is published
    #[serde(default)]
    pub publish_name: Option<String>,
}
