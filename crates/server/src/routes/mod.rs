//! API route handlers for the LADA job server.

pub mod asyncexport;
pub mod health;
pub mod import;

use std::sync::Arc;

use axum::Router;
use lada_server_jobs::RefId;
use serde::Serialize;

use crate::state::AppState;

/// Response of every job-creating endpoint.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub ref_id: String,
}

impl From<RefId> for SubmitResponse {
    fn from(ref_id: RefId) -> Self {
        Self {
            ref_id: ref_id.to_string(),
        }
    }
}

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/asyncexport/csv - Create a CSV export job
/// - POST /api/asyncexport/json - Create a JSON export job
/// - POST /api/asyncexport/laf - Create a LAF export job
/// - GET  /api/asyncexport/status/{ref_id} - Export job status
/// - GET  /api/asyncexport/download/{ref_id} - Download the export file once
/// - POST /api/import/laf/list - Create a multi-file LAF import job
/// - GET  /api/import/status/{ref_id} - Import job status
/// - GET  /api/import/result/{ref_id} - Per-file import report, once
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", asyncexport::router())
        .nest("/api", import::router())
        .with_state(state)
}
