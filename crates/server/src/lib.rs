// crates/server/src/lib.rs
//! LADA job server library.
//!
//! Axum HTTP boundary over the asynchronous job registry: export requests
//! (CSV, JSON, LAF) and multi-file LAF imports are handed to background jobs,
//! clients poll for status and fetch each result exactly once.

pub mod config;
pub mod error;
pub mod identity;
pub mod jobs;
pub mod managers;
pub mod routes;
pub mod state;

pub use config::{Config, ServiceConfig};
pub use error::*;
pub use managers::{ExportJobManager, ImportJobManager};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, asyncexport, import)
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
