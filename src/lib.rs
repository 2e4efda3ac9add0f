//! omx-vision library interface
//!
//! Webhook service that keeps a cloud image-classification training
//! project in sync with "artwork" records in the host CMS: tag creation,
//! image-variant upload, training, iteration publishing, and cleanup.
//!
//! Exposed as a library so integration tests can drive the router.

pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod services;

pub use crate::config::TrainerConfig;
pub use crate::error::{ApiError, ApiResult, Result, TrainError};

use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Application state shared across webhook handlers
#[derive(Clone)]
pub struct AppState {
    /// Static project configuration
    pub config: Arc<TrainerConfig>,
    /// Advisory lock serializing train/publish sequences for the single
    /// production publish slot
    pub train_lock: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config: Arc::new(config),
            train_lock: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
        }
    }
}

/// Build the webhook router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(hooks::health))
        .route("/hooks/artwork/create", post(hooks::artwork_created))
        .route(
            "/hooks/artwork/create/filter",
            post(hooks::artwork_create_filter),
        )
        .route("/hooks/artwork/update", post(hooks::artwork_updated))
        .route("/hooks/artwork/delete", post(hooks::artwork_deleted))
        .with_state(state)
}
