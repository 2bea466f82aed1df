use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use restyle_core::contracts::{BlobError, StoreError};
use restyle_core::error::CoreError;
use restyle_pipeline::service::SubmitError;

/// Application-level error type for HTTP handlers.
///
/// Wraps domain errors from the core and pipeline crates and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `restyle_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A record-store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A blob-storage error.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// A submission error from the pipeline's submit service.
    #[error(transparent)]
    Submit(#[from] SubmitError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            // --- Record store ---
            AppError::Store(store) => match store {
                StoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                StoreError::Query(msg) => {
                    tracing::error!(error = %msg, "Record store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "STORE_ERROR",
                        "The record store is unavailable".to_string(),
                    )
                }
            },

            // --- Blob storage ---
            AppError::Blob(blob) => match blob {
                BlobError::NotFound(blob_ref) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Blob {blob_ref} not found"),
                ),
                BlobError::Io(msg) => {
                    tracing::error!(error = %msg, "Blob storage error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "BLOB_ERROR",
                        "Blob storage is unavailable".to_string(),
                    )
                }
            },

            // --- Submission ---
            AppError::Submit(submit) => match submit {
                SubmitError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                SubmitError::Draining => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "DRAINING",
                    "The service is shutting down and not accepting submissions".to_string(),
                ),
                SubmitError::Store(msg) => {
                    tracing::error!(error = %msg, "Record store error during submit");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "STORE_ERROR",
                        "The record store is unavailable".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
