//! Asynchronous export endpoints.
//!
//! Payloads are taken as raw JSON and only parsed by the job, so an invalid
//! export request still yields a reference id whose job ends in `error`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lada_core::params::LafExportRequest;
use lada_server_jobs::{Artifact, JobStatusSnapshot, RefId};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::identity::{requested_charset, requested_locale, Caller};
use crate::routes::SubmitResponse;
use crate::state::AppState;

/// POST /api/asyncexport/csv - Create a CSV export job.
pub async fn create_csv_export(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Json<SubmitResponse>> {
    let charset = requested_charset(&headers, &state.config.default_charset)?;
    let locale = requested_locale(&headers, &state.config.default_locale);
    let ref_id = state
        .exports
        .create_csv_export(owner, payload, charset, locale)?;
    Ok(Json(ref_id.into()))
}

/// POST /api/asyncexport/json - Create a JSON export job. Output is UTF-8.
pub async fn create_json_export(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Json<SubmitResponse>> {
    let locale = requested_locale(&headers, &state.config.default_locale);
    let ref_id = state.exports.create_json_export(owner, payload, locale)?;
    Ok(Json(ref_id.into()))
}

/// POST /api/asyncexport/laf - Create a LAF export job.
///
/// A body naming neither `proben` nor `messungen` is answered with 404.
pub async fn create_laf_export(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<Json<SubmitResponse>> {
    if !LafExportRequest::names_records(&payload) {
        return Err(ApiError::NotFound("No records to export given".to_string()));
    }
    let charset = requested_charset(&headers, &state.config.default_charset)?;
    let locale = requested_locale(&headers, &state.config.default_locale);
    let ref_id = state
        .exports
        .create_laf_export(owner, payload, charset, locale)?;
    Ok(Json(ref_id.into()))
}

/// GET /api/asyncexport/status/{ref_id} - Status of an export job.
pub async fn export_status(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(ref_id): Path<String>,
) -> ApiResult<Json<JobStatusSnapshot>> {
    let snapshot = state.exports.status(&RefId::from(ref_id), &requester)?;
    Ok(Json(snapshot))
}

/// GET /api/asyncexport/download/{ref_id} - Download the export file.
///
/// The job is evicted afterwards; a second download answers 404.
pub async fn download_export(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(ref_id): Path<String>,
) -> ApiResult<Response> {
    let artifact = state
        .exports
        .take_result(&RefId::from(ref_id), &requester)
        .await?;
    Ok(attachment(artifact))
}

/// Raw bytes with the stored content type and download name.
pub(crate) fn attachment(artifact: Artifact) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        artifact.filename.replace(['"', '\\'], "_")
    );
    (
        [
            (header::CONTENT_TYPE, artifact.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response()
}

/// Create the export routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/asyncexport/csv", post(create_csv_export))
        .route("/asyncexport/json", post(create_json_export))
        .route("/asyncexport/laf", post(create_laf_export))
        .route("/asyncexport/status/{ref_id}", get(export_status))
        .route("/asyncexport/download/{ref_id}", get(download_export))
}
