//! Submission and batch-status entry points.
//!
//! The HTTP layer calls into these; neither holds pipeline state beyond
//! the shared store and queue handles.

use std::sync::Arc;

use serde::Serialize;
use validator::Validate;

use restyle_core::batch::{aggregate, BatchRollup};
use restyle_core::contracts::{JobStore, StoreError};
use restyle_core::job::{BatchRecord, JobRecord, StyleRequest};
use restyle_core::status::{JobStatus, PriorityClass};
use restyle_core::style;
use restyle_core::types::{BatchId, JobId};

use crate::queue::{JobMessage, JobQueue};

/// Submission failures surfaced to the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The queue is closed; shutdown has begun.
    #[error("submissions are not being accepted")]
    Draining,
}

/// Creates job rows and feeds the queue.
pub struct SubmitService {
    store: Arc<dyn JobStore>,
    queue: Arc<JobQueue>,
}

impl SubmitService {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<JobQueue>) -> Self {
        Self { store, queue }
    }

    /// Submit one job. The row is persisted in `queued` before the queue
    /// message exists, so a poll arriving immediately after this returns
    /// sees the job.
    pub async fn submit(
        &self,
        input_ref: String,
        request: StyleRequest,
        priority: PriorityClass,
    ) -> Result<JobId, SubmitError> {
        request
            .validate()
            .map_err(|e| SubmitError::Validation(e.to_string()))?;
        style::lookup(&request.style_id).map_err(|e| SubmitError::Validation(e.to_string()))?;

        let job = JobRecord::new(input_ref, request, priority);
        self.store.create_job(&job).await?;

        if self.queue.push(JobMessage::from(&job)).is_err() {
            // The row stays queued; the next startup scan re-enqueues it.
            tracing::warn!(job_id = %job.id, "Queue closed at submit time; row left queued");
            return Err(SubmitError::Draining);
        }

        tracing::info!(
            job_id = %job.id,
            style_id = %job.request.style_id,
            priority = job.priority.as_str(),
            "Job submitted",
        );
        Ok(job.id)
    }

    /// Submit an ordered group of jobs and record the batch over them.
    /// Member order mirrors the submitted item order.
    pub async fn create_batch(
        &self,
        items: Vec<(String, StyleRequest)>,
        priority: PriorityClass,
    ) -> Result<BatchRecord, SubmitError> {
        let mut job_ids = Vec::with_capacity(items.len());
        for (input_ref, request) in items {
            job_ids.push(self.submit(input_ref, request, priority).await?);
        }

        let batch = BatchRecord::new(job_ids);
        self.store.create_batch(&batch).await?;
        tracing::info!(
            batch_id = %batch.id,
            jobs = batch.job_ids.len(),
            "Batch created",
        );
        Ok(batch)
    }
}

/// Per-member slice of a batch status response. Positional: index `i`
/// corresponds to the `i`-th submitted item.
#[derive(Debug, Clone, Serialize)]
pub struct BatchMemberView {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
}

/// Aggregated batch view returned to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatusView {
    pub batch_id: BatchId,
    #[serde(flatten)]
    pub rollup: BatchRollup,
    pub jobs: Vec<BatchMemberView>,
}

/// Read-time batch aggregation over the record store.
pub struct BatchStatusService {
    store: Arc<dyn JobStore>,
}

impl BatchStatusService {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Compute the derived status for a batch, or `None` for an unknown
    /// batch id. Members whose rows are not visible yet read as
    /// `(queued, 0)`. Pure read; safe to poll arbitrarily often.
    pub async fn batch_status(
        &self,
        batch_id: BatchId,
    ) -> Result<Option<BatchStatusView>, StoreError> {
        let Some(ids) = self.store.get_batch_job_ids(batch_id).await? else {
            return Ok(None);
        };

        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            let (status, progress) = match self.store.get_job(id).await? {
                Some(job) => (job.status, job.progress),
                None => (JobStatus::Queued, 0),
            };
            members.push(BatchMemberView {
                job_id: id,
                status,
                progress,
            });
        }

        let pairs: Vec<(JobStatus, u8)> = members.iter().map(|m| (m.status, m.progress)).collect();
        Ok(Some(BatchStatusView {
            batch_id,
            rollup: aggregate(&pairs),
            jobs: members,
        }))
    }
}

/// Re-enqueue rows a previous run left in `queued`.
///
/// Rows found `running` are *not* replayed: the generation call is not
/// exactly-once, so a mid-flight crash needs operator attention instead
/// of a silent duplicate submission to the provider.
pub async fn requeue_pending(
    store: &Arc<dyn JobStore>,
    queue: &JobQueue,
) -> Result<usize, StoreError> {
    for job in store.jobs_with_status(JobStatus::Running).await? {
        tracing::warn!(
            job_id = %job.id,
            "Job was mid-flight at last shutdown; left as-is for operator review",
        );
    }

    let mut count = 0;
    for job in store.jobs_with_status(JobStatus::Queued).await? {
        if queue.push(JobMessage::from(&job)).is_err() {
            break;
        }
        count += 1;
    }
    if count > 0 {
        tracing::info!(count, "Re-enqueued jobs left queued by a previous run");
    }
    Ok(count)
}
