//! In-process fake remote services for integration tests
//!
//! One axum server plays both the Custom Vision training API and the host
//! CMS file service. The fake enforces the remote invariants the real
//! service enforces: duplicate tag names are rejected, only one iteration
//! may hold a publish name, published iterations cannot be deleted, and
//! training requires a minimum image count.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, TimeZone, Utc};
use omx_vision::TrainerConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct FakeTag {
    pub id: String,
    pub name: String,
}

pub struct FakeImage {
    pub id: String,
    pub tag_id: String,
}

pub struct FakeIteration {
    pub id: String,
    pub status: String,
    pub polls_remaining: u32,
    pub trained_at: Option<DateTime<Utc>>,
    pub publish_name: Option<String>,
}

pub struct FakeVisionState {
    pub base_url: String,
    pub tags: Vec<FakeTag>,
    pub images: Vec<FakeImage>,
    pub iterations: Vec<FakeIteration>,
    /// Reject the next train requests with a 400
    pub fail_training: bool,
    /// Minimum tagged-image count before training is accepted
    pub min_images_to_train: usize,
    /// How many status polls a new iteration needs before completing
    pub polls_to_complete: u32,
    /// Chronological call log for ordering assertions
    pub calls: Vec<String>,
    next_iteration: u32,
    clock: i64,
}

impl FakeVisionState {
    fn new(base_url: String) -> Self {
        Self {
            base_url,
            tags: Vec::new(),
            images: Vec::new(),
            iterations: Vec::new(),
            fail_training: false,
            min_images_to_train: 5,
            polls_to_complete: 2,
            calls: Vec::new(),
            next_iteration: 0,
            clock: 0,
        }
    }

    fn log(&mut self, call: String) {
        self.calls.push(call);
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.timestamp_opt(1_767_600_000 + self.clock, 0).unwrap()
    }

    /// Seed an already-trained iteration directly.
    pub fn seed_iteration(
        &mut self,
        id: &str,
        trained_at: DateTime<Utc>,
        publish_name: Option<&str>,
    ) {
        self.iterations.push(FakeIteration {
            id: id.to_string(),
            status: "Completed".to_string(),
            polls_remaining: 0,
            trained_at: Some(trained_at),
            publish_name: publish_name.map(String::from),
        });
    }

    pub fn seed_tag_with_images(&mut self, tag_id: &str, name: &str, image_count: usize) {
        self.tags.push(FakeTag {
            id: tag_id.to_string(),
            name: name.to_string(),
        });
        for i in 0..image_count {
            self.images.push(FakeImage {
                id: format!("{}-img-{}", tag_id, i),
                tag_id: tag_id.to_string(),
            });
        }
    }

    pub fn published_under(&self, publish_name: &str) -> Vec<&FakeIteration> {
        self.iterations
            .iter()
            .filter(|it| it.publish_name.as_deref() == Some(publish_name))
            .collect()
    }

    pub fn first_call_index(&self, prefix: &str) -> Option<usize> {
        self.calls.iter().position(|c| c.starts_with(prefix))
    }

    pub fn last_call_index(&self, prefix: &str) -> Option<usize> {
        self.calls.iter().rposition(|c| c.starts_with(prefix))
    }
}

type Shared = Arc<Mutex<FakeVisionState>>;

pub struct FakeRemote {
    pub base_url: String,
    pub state: Shared,
}

impl FakeRemote {
    pub fn lock(&self) -> std::sync::MutexGuard<'_, FakeVisionState> {
        self.state.lock().unwrap()
    }
}

/// Spawn the fake server on an ephemeral port.
pub async fn spawn_fake_remote() -> FakeRemote {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let state: Shared = Arc::new(Mutex::new(FakeVisionState::new(base_url.clone())));
    let app = fake_router(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeRemote { base_url, state }
}

/// Trainer configuration pointed at the fake server, with a fast poll.
pub fn test_config(base_url: &str) -> TrainerConfig {
    let toml_text = format!(
        r#"
            endpoint = "{base}"
            project_id = "proj-test"
            training_key = "test-key"
            prediction_resource_id = "res-test"
            publish_name = "production"
            cms_base_url = "{base}"
            poll_interval_ms = 5
            poll_max_attempts = 50
        "#,
        base = base_url
    );
    toml::from_str(&toml_text).unwrap()
}

/// A small valid PNG used as the artwork photo.
pub fn png_bytes() -> Vec<u8> {
    let mut img = image::RgbaImage::new(32, 24);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = image::Rgba([(x * 8) as u8, (y * 10) as u8, 64, 255]);
    }
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageOutputFormat::Png,
        )
        .unwrap();
    buffer
}

fn fake_router(state: Shared) -> Router {
    const P: &str = "/customvision/v3.0/training/projects/:project";

    Router::new()
        .route(&format!("{P}/tags"), post(create_tag).get(list_tags))
        .route(&format!("{P}/tags/:tag_id"), delete(delete_tag))
        .route(&format!("{P}/images/files"), post(upload_image_files))
        .route(&format!("{P}/images/urls"), post(upload_image_urls))
        .route(&format!("{P}/images/tagged"), get(list_tagged_images))
        .route(&format!("{P}/images"), delete(delete_images))
        .route(&format!("{P}/train"), post(train))
        .route(&format!("{P}/iterations"), get(list_iterations))
        .route(
            &format!("{P}/iterations/:iteration_id"),
            get(get_iteration).delete(delete_iteration),
        )
        .route(
            &format!("{P}/iterations/:iteration_id/publish"),
            post(publish_iteration).delete(unpublish_iteration),
        )
        .route("/files/:file_id", get(cms_file_lookup))
        .route("/assets/:file_id", get(cms_asset))
        .with_state(state)
}

fn remote_error(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "Code": status.as_u16(), "Message": message })),
    )
}

fn iteration_json(it: &FakeIteration) -> Value {
    json!({
        "id": it.id,
        "name": it.id,
        "status": it.status,
        "trainedAt": it.trained_at,
        "publishName": it.publish_name,
    })
}

async fn create_tag(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let name = params.get("name").cloned().unwrap_or_default();
    let mut state = state.lock().unwrap();

    if state.tags.iter().any(|t| t.name == name) {
        return remote_error(StatusCode::BAD_REQUEST, "Tag name already exists")
            .into_response();
    }

    let id = uuid::Uuid::new_v4().to_string();
    state.log(format!("create_tag:{}", name));
    state.tags.push(FakeTag {
        id: id.clone(),
        name: name.clone(),
    });

    Json(json!({ "id": id, "name": name })).into_response()
}

async fn list_tags(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(Value::Array(
        state
            .tags
            .iter()
            .map(|t| json!({ "id": t.id, "name": t.name }))
            .collect(),
    ))
}

async fn delete_tag(
    State(state): State<Shared>,
    Path((_, tag_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    state.log(format!("delete_tag:{}", tag_id));

    let before = state.tags.len();
    state.tags.retain(|t| t.id != tag_id);
    if state.tags.len() == before {
        return remote_error(StatusCode::NOT_FOUND, "Tag not found").into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn upload_image_files(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    upload_images(state, body, "files")
}

async fn upload_image_urls(
    State(state): State<Shared>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    upload_images(state, body, "urls")
}

fn upload_images(state: Shared, body: Value, kind: &str) -> axum::response::Response {
    let tag_id = body["tagIds"][0].as_str().unwrap_or_default().to_string();
    let count = body["images"].as_array().map(|a| a.len()).unwrap_or(0);

    let mut state = state.lock().unwrap();
    if !state.tags.iter().any(|t| t.id == tag_id) {
        return remote_error(StatusCode::BAD_REQUEST, "Unknown tag").into_response();
    }

    state.log(format!("upload_images:{}:{}:{}", kind, count, tag_id));
    for _ in 0..count {
        let id = uuid::Uuid::new_v4().to_string();
        state.images.push(FakeImage {
            id,
            tag_id: tag_id.clone(),
        });
    }

    Json(json!({ "isBatchSuccessful": true })).into_response()
}

async fn list_tagged_images(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let tag_id = params.get("tagIds").cloned().unwrap_or_default();
    let state = state.lock().unwrap();
    Json(Value::Array(
        state
            .images
            .iter()
            .filter(|img| img.tag_id == tag_id)
            .map(|img| json!({ "id": img.id }))
            .collect(),
    ))
}

async fn delete_images(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let ids: Vec<&str> = params
        .get("imageIds")
        .map(|s| s.split(',').collect())
        .unwrap_or_default();

    let mut state = state.lock().unwrap();
    state.log(format!("delete_images:{}", ids.len()));
    state.images.retain(|img| !ids.contains(&img.id.as_str()));
    StatusCode::NO_CONTENT
}

async fn train(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let force = params.get("forceTrain").map(|v| v == "true").unwrap_or(false);
    let mut state = state.lock().unwrap();
    state.log(format!("train:force={}", force));

    if state.fail_training {
        return remote_error(StatusCode::BAD_REQUEST, "Training failed by test setup")
            .into_response();
    }
    if state.images.len() < state.min_images_to_train {
        return remote_error(StatusCode::BAD_REQUEST, "Not enough images to train")
            .into_response();
    }

    state.next_iteration += 1;
    let id = format!("iter-{}", state.next_iteration);
    let polls = state.polls_to_complete;
    state.iterations.push(FakeIteration {
        id: id.clone(),
        status: "Training".to_string(),
        polls_remaining: polls,
        trained_at: None,
        publish_name: None,
    });

    Json(json!({ "id": id, "status": "Training" })).into_response()
}

async fn list_iterations(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(Value::Array(
        state.iterations.iter().map(iteration_json).collect(),
    ))
}

async fn get_iteration(
    State(state): State<Shared>,
    Path((_, iteration_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut state = state.lock().unwrap();

    let Some(index) = state.iterations.iter().position(|it| it.id == iteration_id) else {
        return remote_error(StatusCode::NOT_FOUND, "Iteration not found").into_response();
    };

    if state.iterations[index].status == "Training" {
        if state.iterations[index].polls_remaining <= 1 {
            let trained_at = state.next_timestamp();
            let it = &mut state.iterations[index];
            it.status = "Completed".to_string();
            it.polls_remaining = 0;
            it.trained_at = Some(trained_at);
        } else {
            state.iterations[index].polls_remaining -= 1;
        }
    }

    let status = state.iterations[index].status.clone();
    state.log(format!("get_iteration:{}:{}", iteration_id, status));
    let body = iteration_json(&state.iterations[index]);
    Json(body).into_response()
}

async fn publish_iteration(
    State(state): State<Shared>,
    Path((_, iteration_id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let publish_name = params.get("publishName").cloned().unwrap_or_default();
    let mut state = state.lock().unwrap();
    state.log(format!("publish:{}:{}", iteration_id, publish_name));

    if state
        .iterations
        .iter()
        .any(|it| it.id != iteration_id && it.publish_name.as_deref() == Some(publish_name.as_str()))
    {
        return remote_error(StatusCode::BAD_REQUEST, "Publish name already in use")
            .into_response();
    }

    let Some(it) = state.iterations.iter_mut().find(|it| it.id == iteration_id) else {
        return remote_error(StatusCode::NOT_FOUND, "Iteration not found").into_response();
    };
    if it.status != "Completed" {
        return remote_error(StatusCode::BAD_REQUEST, "Iteration is not trained")
            .into_response();
    }

    it.publish_name = Some(publish_name);
    StatusCode::OK.into_response()
}

async fn unpublish_iteration(
    State(state): State<Shared>,
    Path((_, iteration_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    state.log(format!("unpublish:{}", iteration_id));

    let Some(it) = state.iterations.iter_mut().find(|it| it.id == iteration_id) else {
        return remote_error(StatusCode::NOT_FOUND, "Iteration not found").into_response();
    };

    it.publish_name = None;
    StatusCode::NO_CONTENT.into_response()
}

async fn delete_iteration(
    State(state): State<Shared>,
    Path((_, iteration_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    state.log(format!("delete_iteration:{}", iteration_id));

    let Some(it) = state.iterations.iter().find(|it| it.id == iteration_id) else {
        return remote_error(StatusCode::NOT_FOUND, "Iteration not found").into_response();
    };
    if it.publish_name.is_some() {
        return remote_error(StatusCode::BAD_REQUEST, "Cannot delete a published iteration")
            .into_response();
    }

    state.iterations.retain(|it| it.id != iteration_id);
    StatusCode::NO_CONTENT.into_response()
}

async fn cms_file_lookup(
    State(state): State<Shared>,
    Path(file_id): Path<String>,
) -> impl IntoResponse {
    let state = state.lock().unwrap();
    Json(json!({
        "data": { "full_url": format!("{}/assets/{}", state.base_url, file_id) }
    }))
}

async fn cms_asset(Path(_file_id): Path<String>) -> impl IntoResponse {
    png_bytes()
}
