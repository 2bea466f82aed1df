//! Handlers for the `/jobs` resource.
//!
//! Submission is fire-and-forget: the response carries only the job id,
//! and clients poll `GET /jobs/{id}` for progress and the result URL.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use restyle_core::error::CoreError;
use restyle_core::job::{JobRecord, StyleRequest};
use restyle_core::status::{JobStatus, PriorityClass};
use restyle_core::types::{JobId, Timestamp};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /api/v1/jobs`.
#[derive(Debug, Deserialize)]
pub struct SubmitJobBody {
    /// Reference returned by `POST /api/v1/photos`.
    pub input_ref: String,
    /// Queue priority class; defaults to `standard`.
    #[serde(default)]
    pub priority: PriorityClass,
    pub request: StyleRequest,
}

/// Response body for a submission.
#[derive(Debug, Serialize)]
pub struct SubmittedJob {
    pub job_id: JobId,
}

/// Client-facing view of a job row.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,
    /// Download URL for the styled image; present only once `done`.
    pub result_url: Option<String>,
    pub created_at: Timestamp,
}

/// Build the client view, deriving the download URL for finished jobs.
async fn job_view(state: &AppState, job: JobRecord) -> JobView {
    let result_url = match (&job.status, &job.result_ref) {
        (JobStatus::Done, Some(result_ref)) => {
            match state.blobs.signed_download_url(result_ref).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "Could not derive result URL");
                    None
                }
            }
        }
        _ => None,
    };

    JobView {
        id: job.id,
        status: job.status,
        progress: job.progress,
        error: job.error,
        result_url,
        created_at: job.created_at,
    }
}

/// POST /api/v1/jobs
///
/// Submit a new generation job. Returns 201 with the job id; the job row
/// exists (in `queued`) before this responds, so an immediate status
/// poll succeeds.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(body): Json<SubmitJobBody>,
) -> AppResult<impl IntoResponse> {
    if body.input_ref.trim().is_empty() {
        return Err(AppError::BadRequest("input_ref must not be empty".into()));
    }

    let job_id = state
        .submit
        .submit(body.input_ref, body.request, body.priority)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedJob { job_id },
        }),
    ))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .store
        .get_job(job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    let view = job_view(&state, job).await;
    Ok(Json(DataResponse { data: view }))
}

/// DELETE /api/v1/jobs/{id}
///
/// Remove the job row and best-effort delete its blobs. An in-flight
/// worker is not interrupted; its final write becomes orphaned and
/// harmless.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .store
        .get_job(job_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }))?;

    state.store.delete_job(job_id).await?;

    for blob_ref in [Some(&job.input_ref), job.result_ref.as_ref()]
        .into_iter()
        .flatten()
    {
        if let Err(e) = state.blobs.delete(blob_ref).await {
            tracing::warn!(job_id = %job_id, blob_ref = %blob_ref, error = %e, "Blob cleanup failed");
        }
    }

    tracing::info!(job_id = %job_id, "Job deleted");
    Ok(StatusCode::NO_CONTENT)
}
