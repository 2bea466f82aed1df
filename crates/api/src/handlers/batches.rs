//! Handlers for the `/batches` resource.
//!
//! A batch is an ordered, immutable group of jobs created in one call.
//! Status is derived at read time by the batch status service, never
//! stored.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use restyle_core::error::CoreError;
use restyle_core::job::StyleRequest;
use restyle_core::status::PriorityClass;
use restyle_core::types::{BatchId, JobId};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Largest accepted batch.
const MAX_BATCH_SIZE: usize = 20;

/// One member of a batch creation request.
#[derive(Debug, Deserialize)]
pub struct BatchItem {
    pub input_ref: String,
    pub request: StyleRequest,
}

/// Request body for `POST /api/v1/batches`.
#[derive(Debug, Deserialize)]
pub struct CreateBatchBody {
    /// Queue priority class applied to every member; defaults to `standard`.
    #[serde(default)]
    pub priority: PriorityClass,
    pub items: Vec<BatchItem>,
}

/// Response body for a batch creation. `job_ids` order mirrors the
/// submitted item order.
#[derive(Debug, Serialize)]
pub struct CreatedBatch {
    pub batch_id: BatchId,
    pub job_ids: Vec<JobId>,
}

/// POST /api/v1/batches
pub async fn create_batch(
    State(state): State<AppState>,
    Json(body): Json<CreateBatchBody>,
) -> AppResult<impl IntoResponse> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest("items must not be empty".into()));
    }
    if body.items.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "a batch may contain at most {MAX_BATCH_SIZE} items"
        )));
    }
    if let Some(bad) = body.items.iter().find(|item| item.input_ref.trim().is_empty()) {
        return Err(AppError::BadRequest(format!(
            "input_ref must not be empty (style '{}')",
            bad.request.style_id
        )));
    }

    let items = body
        .items
        .into_iter()
        .map(|item| (item.input_ref, item.request))
        .collect();
    let batch = state.submit.create_batch(items, body.priority).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedBatch {
                batch_id: batch.id,
                job_ids: batch.job_ids,
            },
        }),
    ))
}

/// GET /api/v1/batches/{id}
///
/// Aggregated batch status, derived fresh on every poll.
pub async fn get_batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> AppResult<impl IntoResponse> {
    let view = state
        .batches
        .batch_status(batch_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Batch",
            id: batch_id,
        }))?;

    Ok(Json(DataResponse { data: view }))
}
