// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! The HTTP edge: an `axum::Router` mounting the upload/list/metadata routes
//! over the upload queue, admission guard, and external collaborators.
//!
//! Handlers hold no business logic of their own: they parse the request,
//! call a core method, and serialize the `{"data": …, "message": …}`
//! envelope every response shares.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::admission::AdmissionGuard;
use crate::core::IngestError;
use crate::external::{ObjectStore, RunFilter, RunPatch, RunRepository};
use crate::upload::job::JobDate;
use crate::upload::{Job, UploadQueue};

const NON_UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);
const RESET_FIELD_DOMAIN: [&str; 4] = ["location", "notes", "event_type", "car_model"];

/// Everything a route handler needs to reach the core pipeline.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<UploadQueue>,
    pub admission: Arc<AdmissionGuard>,
    pub run_repository: Arc<dyn RunRepository>,
    pub object_store: Arc<dyn ObjectStore>,
    pub upload_dir: PathBuf,
}

/// The `{"data": …, "message": …}` envelope every response shares.
#[derive(Serialize)]
struct DataEnvelope<T: Serialize> {
    data: T,
    message: serde_json::Value,
}

impl<T: Serialize> DataEnvelope<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            message: serde_json::Value::Object(Default::default()),
        }
    }
}

/// A handler failure, carrying the HTTP status it maps to.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let status = match &err {
            IngestError::AdmissionRejected { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngestError::StorageFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(DataEnvelope::new(serde_json::Value::String(self.message))),
        )
            .into_response()
    }
}

/// Mounts the route table under `/api/v2`. Upload routes carry no timeout
/// (the bodies can be large and slow); every other route is bounded per the
/// per-request HTTP timeout.
pub fn build_router(state: AppState) -> Router {
    let uploads = Router::new()
        .route("/mcaps/upload", post(upload_mcap))
        .route("/mcaps/bulk_upload", post(bulk_upload_mcaps));

    let rest = Router::new()
        .route("/mcaps", get(get_mcaps))
        .route("/mcaps/{id}", get(get_mcap).delete(delete_mcap))
        .route("/mcaps/{id}/updateMetadataRecords", post(update_metadata_records))
        .route("/mcaps/{id}/resetMetaDataRecord/{key}", axum::routing::delete(reset_metadata_record))
        .route("/uploads/limits", get(get_upload_limits))
        .route("/ping", get(ping))
        .layer(TimeoutLayer::new(NON_UPLOAD_TIMEOUT));

    Router::new()
        .nest("/api/v2", uploads.merge(rest))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Stages one uploaded file as a scratch file and enqueues it, returning the
/// new job's ID. The `<dir>/job_<nano>_<filename>` naming matches the
/// on-disk layout convention.
async fn queue_upload(state: &AppState, filename: &str, bytes: Vec<u8>) -> Result<String, IngestError> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let scratch_path = state.upload_dir.join(format!("job_{nanos}_{filename}"));
    tokio::fs::write(&scratch_path, &bytes)
        .await
        .map_err(|e| IngestError::storage_failure("scratch-write", e.to_string()))?;

    let job = Job::new(
        filename,
        scratch_path.to_string_lossy().to_string(),
        bytes.len() as u64,
        JobDate::from_enqueue_time(Utc::now()),
        Utc::now(),
    );
    let job_id = job.id.to_string();
    state.queue.enqueue(job);
    Ok(job_id)
}

async fn upload_mcap(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<DataEnvelope<Vec<String>>>, ApiError> {
    state.admission.admit(content_length(&headers))?;

    let mut job_ids = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.mcap").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let job_id = queue_upload(&state, &filename, bytes.to_vec()).await?;
        job_ids.push(job_id);
        break;
    }

    Ok(Json(DataEnvelope::new(job_ids)))
}

async fn bulk_upload_mcaps(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<DataEnvelope<Vec<String>>>, ApiError> {
    state.admission.admit(content_length(&headers))?;

    let mut job_ids = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.mcap").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        match queue_upload(&state, &filename, bytes.to_vec()).await {
            Ok(job_id) => job_ids.push(job_id),
            Err(err) => tracing::warn!(filename = %filename, error = %err, "failed to queue file"),
        }
    }

    Ok(Json(DataEnvelope::new(job_ids)))
}

/// Query parameters for `GET /mcaps`, mirroring §6's filter table. RFC3339
/// date bounds that fail to parse are treated as absent rather than
/// rejecting the whole request.
#[derive(Debug, Deserialize, Default)]
struct McapsQuery {
    id: Option<String>,
    before_date: Option<String>,
    after_date: Option<String>,
    location: Option<String>,
    event_type: Option<String>,
    car_model: Option<String>,
    search_text: Option<String>,
    limit: Option<i64>,
    offset: Option<u64>,
    /// Accepted for compatibility with the documented query surface; MATLAB
    /// post-processing result filtering is not implemented by this crate.
    #[serde(default)]
    #[allow(dead_code)]
    mps_function: Option<String>,
}

fn parse_rfc3339(value: &Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl From<McapsQuery> for RunFilter {
    fn from(query: McapsQuery) -> Self {
        RunFilter {
            id: query.id,
            before_date: parse_rfc3339(&query.before_date),
            after_date: parse_rfc3339(&query.after_date),
            location: query.location,
            event_type: query.event_type,
            car_model: query.car_model,
            search_text: query.search_text,
            limit: query.limit,
            offset: query.offset,
        }
    }
}

async fn get_mcaps(
    State(state): State<AppState>,
    Query(query): Query<McapsQuery>,
) -> Result<Json<DataEnvelope<Vec<crate::external::RunRecord>>>, ApiError> {
    let filter: RunFilter = query.into();
    let runs = state.run_repository.find(&filter).await?;
    Ok(Json(DataEnvelope::new(runs)))
}

async fn get_mcap(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataEnvelope<crate::external::RunRecord>>, ApiError> {
    let filter = RunFilter {
        id: Some(id.clone()),
        ..Default::default()
    };
    let mut runs = state.run_repository.find(&filter).await?;
    if runs.is_empty() {
        return Err(ApiError::not_found(format!("no run with id {id} found")));
    }
    Ok(Json(DataEnvelope::new(runs.remove(0))))
}

/// Splits an object-storage MCAP key (`MM-DD-YYYY/<name>.mcap`) into the
/// companion HDF5 and plot keys written alongside it (§4.G step 7).
fn companion_keys(mcap_key: &str) -> (String, String, String) {
    let prefix = mcap_key.strip_suffix(".mcap").unwrap_or(mcap_key);
    (
        format!("{prefix}.h5"),
        format!("{prefix}_track.png"),
        format!("{prefix}_velocity.png"),
    )
}

async fn delete_mcap(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<DataEnvelope<()>>, ApiError> {
    let filter = RunFilter {
        id: Some(id.clone()),
        ..Default::default()
    };
    let mut runs = state.run_repository.find(&filter).await?;
    if runs.is_empty() {
        return Err(ApiError::not_found(format!("no run with id {id} found")));
    }
    let run = runs.remove(0);

    let (hdf5_key, track_key, velocity_key) = companion_keys(&run.object_store_key);
    for key in [run.object_store_key.as_str(), &hdf5_key, &track_key, &velocity_key] {
        state.object_store.delete(key).await?;
    }

    state.run_repository.delete(&id).await?;
    Ok(Json(DataEnvelope::new(())))
}

/// Multipart form fields accepted by `updateMetadataRecords`.
async fn update_metadata_records(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DataEnvelope<()>>, ApiError> {
    let mut patch = RunPatch::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        match name.as_str() {
            "date" => patch.date = DateTime::parse_from_rfc3339(&value).ok().map(|dt| dt.with_timezone(&Utc)),
            "location" => patch.location = Some(value),
            "notes" => patch.notes = Some(value),
            "event_type" => patch.event_type = Some(value),
            "car_model" => patch.car_model = Some(value),
            _ => {}
        }
    }

    state.run_repository.update_fields(&id, &patch).await?;
    Ok(Json(DataEnvelope::new(())))
}

async fn reset_metadata_record(
    State(state): State<AppState>,
    Path((id, key)): Path<(String, String)>,
) -> Result<Json<DataEnvelope<()>>, ApiError> {
    if !RESET_FIELD_DOMAIN.contains(&key.as_str()) {
        return Err(ApiError::bad_request(format!(
            "'{key}' is not a resettable metadata field"
        )));
    }
    state.run_repository.unset_field(&id, &key).await?;
    Ok(Json(DataEnvelope::new(())))
}

#[derive(Serialize)]
struct UploadLimits {
    current_bytes: u64,
    max_bytes: u64,
    available_bytes: u64,
}

async fn get_upload_limits(State(state): State<AppState>) -> Json<DataEnvelope<UploadLimits>> {
    let current = state.queue.total_size();
    let max = state.queue.max_total_size();
    Json(DataEnvelope::new(UploadLimits {
        current_bytes: current,
        max_bytes: max,
        available_bytes: max.saturating_sub(current),
    }))
}

async fn ping() -> Json<DataEnvelope<&'static str>> {
    Json(DataEnvelope::new("pong"))
}
