//! Asynchronous LAF import endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use lada_server_jobs::{JobStatusSnapshot, RefId};

use crate::error::{ApiError, ApiResult};
use crate::identity::{header_str, Caller, FACILITY_HEADER};
use crate::jobs::ImportRequest;
use crate::routes::asyncexport::attachment;
use crate::routes::SubmitResponse;
use crate::state::AppState;

/// POST /api/import/laf/list - Create a multi-file LAF import job.
///
/// The measurement facility named by `X-LADA-MST` must exist and is checked
/// before the body is looked at; the files are only decoded by the job.
pub async fn create_import(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    headers: HeaderMap,
    request: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let facility_id = header_str(&headers, FACILITY_HEADER)
        .ok_or_else(|| ApiError::BadRequest("Missing header for messtelle.".to_string()))?;
    let facility = state
        .facilities
        .lookup(facility_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| {
            tracing::warn!(facility = facility_id, user = %owner.user_id, "Unknown facility on import");
            ApiError::Forbidden("Wrong header for messtelle.".to_string())
        })?;
    let Json(request) = request.map_err(|e| {
        tracing::warn!(user = %owner.user_id, error = %e, "Rejected import body");
        ApiError::BadRequest(e.body_text())
    })?;
    let files = request
        .files
        .ok_or_else(|| ApiError::BadRequest("No import files given".to_string()))?;

    let ref_id = state
        .imports
        .create_import_job(owner, facility, request.encoding, files)?;
    Ok(Json(ref_id.into()))
}

/// GET /api/import/status/{ref_id} - Status of an import job.
pub async fn import_status(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(ref_id): Path<String>,
) -> ApiResult<Json<JobStatusSnapshot>> {
    let snapshot = state.imports.status(&RefId::from(ref_id), &requester)?;
    Ok(Json(snapshot))
}

/// GET /api/import/result/{ref_id} - Per-file import report.
///
/// The job is evicted afterwards; a second request answers 404.
pub async fn import_result(
    State(state): State<Arc<AppState>>,
    Caller(requester): Caller,
    Path(ref_id): Path<String>,
) -> ApiResult<Response> {
    let artifact = state
        .imports
        .take_result(&RefId::from(ref_id), &requester)
        .await?;
    Ok(attachment(artifact))
}

/// Create the import routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/import/laf/list", post(create_import))
        .route("/import/status/{ref_id}", get(import_status))
        .route("/import/result/{ref_id}", get(import_result))
}
