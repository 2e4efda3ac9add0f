//! Lifecycle event adapter: CMS webhook handlers
//!
//! Translates host content-lifecycle events (artwork created / updated /
//! soft-deleted) into tag, ingest, and training-lifecycle calls.
//!
//! Error policy: malformed payloads get a 400; remote-lifecycle failures
//! are caught, logged, and reported in the 200 response body so no
//! failure propagates as a 5xx into the host's event dispatcher. The
//! whole materialize-train-publish sequence runs under the per-project
//! advisory lock in `AppState`, serializing concurrent events racing on
//! the single production publish slot.

use crate::error::{ApiError, ApiResult, Result};
use crate::models::{Artwork, ArtworkUpdate, Tag};
use crate::services::variants::DEFAULT_ANGLES;
use crate::services::{
    CmsFilesClient, CustomVisionClient, ImageIngestor, LifecycleCoordinator, TagManager,
};
use crate::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Liveness check
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = (Utc::now() - state.startup_time).num_seconds();
    Json(json!({
        "status": "ok",
        "service": "omx-vision",
        "uptime_seconds": uptime,
    }))
}

/// `POST /hooks/artwork/create` — full new record.
///
/// With a non-null image: create tag (unless the create filter already
/// assigned one), ingest content variants, train and publish forcefully.
pub async fn artwork_created(
    State(state): State<AppState>,
    Json(artwork): Json<Artwork>,
) -> ApiResult<Json<Value>> {
    info!(artwork_id = artwork.id, "Artwork created");

    if artwork.is_deleted() {
        debug!(artwork_id = artwork.id, "Artwork arrived already deleted");
        return Ok(Json(json!({ "status": "skipped", "reason": "deleted" })));
    }

    let Some(image_id) = artwork.image.clone() else {
        debug!(artwork_id = artwork.id, "Artwork has no image, nothing to train");
        return Ok(Json(json!({ "status": "skipped", "reason": "no image" })));
    };

    let _guard = state.train_lock.lock().await;

    match create_sequence(&state, &artwork, &image_id).await {
        Ok(tag_id) => Ok(Json(json!({ "status": "ok", "tag_id": tag_id }))),
        Err(e) => Ok(lifecycle_failure("create", artwork.id, e)),
    }
}

/// `POST /hooks/artwork/create/filter` — pre-persist filter.
///
/// Pre-assigns the new tag id into the payload so the host persists it
/// alongside the entity in one write, avoiding a second round-trip. A
/// remote failure must never block the host's persist, so the payload is
/// returned unmodified in that case.
pub async fn artwork_create_filter(
    State(state): State<AppState>,
    Json(mut payload): Json<Value>,
) -> ApiResult<Json<Value>> {
    let record = payload
        .as_object()
        .ok_or_else(|| ApiError::BadRequest("filter payload must be an object".to_string()))?;

    let has_image = record.get("image").map(|v| !v.is_null()).unwrap_or(false);
    if !has_image {
        return Ok(Json(payload));
    }

    let artist_name = record
        .get("artist_name")
        .and_then(Value::as_str)
        .unwrap_or("artwork")
        .to_string();
    let title = record
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("untitled")
        .to_string();

    match pre_assign_tag(&state, &artist_name, &title).await {
        Ok(tag) => {
            debug!(tag_id = %tag.id, "Pre-assigned tag for new artwork");
            payload["image_recognition_tag_id"] = Value::String(tag.id);
            Ok(Json(payload))
        }
        Err(e) => {
            warn!(error = %e, "Tag pre-assignment failed, persisting without tag id");
            Ok(Json(payload))
        }
    }
}

/// `POST /hooks/artwork/update` — changed fields plus identity.
///
/// Only an image change triggers work. A replacement image means the old
/// tag and its images are cleaned up (idempotently), a fresh tag is
/// created, the new image is ingested, and the model is retrained and
/// republished. An explicit `"image": null` means the image was removed,
/// so the tag is scrubbed without a replacement.
pub async fn artwork_updated(
    State(state): State<AppState>,
    Json(update): Json<ArtworkUpdate>,
) -> ApiResult<Json<Value>> {
    info!(artwork_id = update.id, "Artwork updated");

    if update.is_deleted() {
        return scrub(state, update).await;
    }

    if !update.image_changed() {
        debug!(artwork_id = update.id, "Image unchanged, nothing to retrain");
        return Ok(Json(json!({ "status": "skipped", "reason": "image unchanged" })));
    }

    let _guard = state.train_lock.lock().await;

    match update.new_image().map(str::to_string) {
        Some(image_id) => match update_sequence(&state, &update, &image_id).await {
            Ok(tag_id) => Ok(Json(json!({ "status": "ok", "tag_id": tag_id }))),
            Err(e) => Ok(lifecycle_failure("update", update.id, e)),
        },
        None => {
            info!(artwork_id = update.id, "Image removed, scrubbing its tag");
            match scrub_sequence(&state, &update).await {
                Ok(()) => Ok(Json(json!({ "status": "ok" }))),
                Err(e) => Ok(lifecycle_failure("update", update.id, e)),
            }
        }
    }
}

/// `POST /hooks/artwork/delete` — soft deletion (`status == "deleted"`).
pub async fn artwork_deleted(
    State(state): State<AppState>,
    Json(update): Json<ArtworkUpdate>,
) -> ApiResult<Json<Value>> {
    info!(artwork_id = update.id, "Artwork deleted");
    scrub(state, update).await
}

/// Remove the artwork's tag and images, then retrain and republish so the
/// model no longer recognizes the removed class.
async fn scrub(state: AppState, update: ArtworkUpdate) -> ApiResult<Json<Value>> {
    let _guard = state.train_lock.lock().await;

    match scrub_sequence(&state, &update).await {
        Ok(()) => Ok(Json(json!({ "status": "ok" }))),
        Err(e) => Ok(lifecycle_failure("delete", update.id, e)),
    }
}

async fn create_sequence(state: &AppState, artwork: &Artwork, image_id: &str) -> Result<String> {
    let config = &state.config;
    let client = CustomVisionClient::new(config)?;
    let files = CmsFilesClient::new(config)?;

    let file = files.lookup(image_id).await?;
    let bytes = files.fetch_bytes(&file.full_url).await?;

    // The create filter may have pre-assigned a tag; reuse it rather than
    // creating a second one for the same artwork.
    let tag_id = match &artwork.tag_id {
        Some(tag_id) => {
            debug!(tag_id = %tag_id, "Reusing pre-assigned tag");
            tag_id.clone()
        }
        None => {
            TagManager::new(&client)
                .create_tag_for_artwork(artwork)
                .await?
                .id
        }
    };

    ImageIngestor::new(&client)
        .ingest_by_content(&tag_id, &bytes, &DEFAULT_ANGLES)
        .await?;

    LifecycleCoordinator::new(&client, config)
        .train_and_publish(true, true)
        .await?;

    Ok(tag_id)
}

async fn update_sequence(state: &AppState, update: &ArtworkUpdate, image_id: &str) -> Result<String> {
    let config = &state.config;
    let client = CustomVisionClient::new(config)?;
    let files = CmsFilesClient::new(config)?;
    let tags = TagManager::new(&client);

    // The update event carries only changed fields; when the previous tag
    // id is unknown there is nothing local to clean up and a later delete
    // event still scrubs.
    if let Some(old_tag_id) = &update.tag_id {
        tags.delete_tag_and_images(old_tag_id).await?;
    }

    let artist_name = update.artist_name.as_deref().unwrap_or("artwork");
    let title = update.title.as_deref().unwrap_or("untitled");
    let name = crate::services::tag_manager::tag_name_with_id(update.id, artist_name, title);
    let tag = tags.create_tag(&name).await?;

    let file = files.lookup(image_id).await?;
    let bytes = files.fetch_bytes(&file.full_url).await?;

    ImageIngestor::new(&client)
        .ingest_by_content(&tag.id, &bytes, &DEFAULT_ANGLES)
        .await?;

    LifecycleCoordinator::new(&client, config)
        .train_and_publish(true, true)
        .await?;

    Ok(tag.id)
}

async fn scrub_sequence(state: &AppState, update: &ArtworkUpdate) -> Result<()> {
    let config = &state.config;
    let client = CustomVisionClient::new(config)?;

    match &update.tag_id {
        Some(tag_id) => {
            TagManager::new(&client)
                .delete_tag_and_images(tag_id)
                .await?;
        }
        None => {
            debug!(artwork_id = update.id, "No tag recorded for deleted artwork");
        }
    }

    LifecycleCoordinator::new(&client, config)
        .train_and_publish(true, true)
        .await?;

    Ok(())
}

async fn pre_assign_tag(state: &AppState, artist_name: &str, title: &str) -> Result<Tag> {
    let client = CustomVisionClient::new(&state.config)?;
    let name = crate::services::tag_manager::tag_name(artist_name, title);
    TagManager::new(&client).create_tag(&name).await
}

/// Uniform remote-failure response: logged, reported, never a 5xx.
fn lifecycle_failure(event: &str, artwork_id: i64, error: crate::error::TrainError) -> Json<Value> {
    tracing::error!(event, artwork_id, error = %error, "Training lifecycle failed");
    Json(json!({
        "status": "error",
        "event": event,
        "detail": error.to_string(),
    }))
}
