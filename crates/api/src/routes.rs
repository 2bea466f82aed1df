//! Route tables.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{batches, health, jobs, photos};
use crate::state::AppState;

/// Health check at root level (not under /api/v1).
pub fn health_router() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}

/// All /api/v1 routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/photos", post(photos::upload_photo))
        .route("/jobs", post(jobs::submit_job))
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/batches", post(batches::create_batch))
        .route("/batches/{id}", get(batches::get_batch_status))
}
