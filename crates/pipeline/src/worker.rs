//! Per-job generation state machine.
//!
//! One dequeued message is driven through the ordered pipeline stages;
//! each stage writes its progress checkpoint before the next begins.
//! Stage errors terminate the job as `failed` with a caller-facing
//! reason. The two face stages are the exception: they are fail-open and
//! can only ever be skipped, never fail the job.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use restyle_core::contracts::{
    BlobError, BlobStore, FaceRestoreProvider, GenerationProvider, GenerationRequest, JobStore,
    ModerationError, ModerationGate, ProviderError, StoreError, DEFAULT_FLAGGED_REASON,
};
use restyle_core::progress::{
    PROGRESS_COMPLETE, PROGRESS_COMPOSED, PROGRESS_FACE_ENHANCED, PROGRESS_FACE_ENHANCE_STARTED,
    PROGRESS_FACE_RESTORED, PROGRESS_FACE_RESTORE_STARTED, PROGRESS_GENERATED,
    PROGRESS_GENERATING, PROGRESS_INPUT_FETCHED, PROGRESS_MODERATED,
};
use restyle_core::status::JobStatus;
use restyle_core::types::JobId;
use restyle_core::{prompt, style};

use crate::queue::JobMessage;
use crate::ticker::{ProgressTicker, TickerConfig};

/// Why a job failed. The display string is what lands in the job row's
/// `error` column, so each variant formats as a caller-facing reason.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    /// Policy rejection from a moderation gate; not a system fault.
    #[error("{0}")]
    Moderation(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gate(#[from] ModerationError),
}

/// Drives the pipeline stages for dequeued jobs. One instance is shared
/// by every worker task in the pool; per-job state lives on the stack of
/// [`run_job`](Self::run_job).
pub struct GenerationWorker {
    store: Arc<dyn JobStore>,
    blobs: Arc<dyn BlobStore>,
    gate: Arc<dyn ModerationGate>,
    generator: Arc<dyn GenerationProvider>,
    faces: Arc<dyn FaceRestoreProvider>,
    ticker: TickerConfig,
    /// Parent token for ticker tasks; tripped on process shutdown.
    cancel: CancellationToken,
}

impl GenerationWorker {
    pub fn new(
        store: Arc<dyn JobStore>,
        blobs: Arc<dyn BlobStore>,
        gate: Arc<dyn ModerationGate>,
        generator: Arc<dyn GenerationProvider>,
        faces: Arc<dyn FaceRestoreProvider>,
        ticker: TickerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            blobs,
            gate,
            generator,
            faces,
            ticker,
            cancel,
        }
    }

    /// Run one job to a terminal state. Never returns an error: every
    /// failure is recorded on the job row instead.
    pub async fn run_job(&self, msg: JobMessage) {
        let job_id = msg.job_id;
        match self.execute(&msg).await {
            Ok(result_ref) => {
                tracing::info!(job_id = %job_id, result_ref = %result_ref, "Job completed");
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Job failed");
                if let Err(write_err) = self
                    .store
                    .update_status(job_id, JobStatus::Failed, PROGRESS_COMPLETE, Some(&e.to_string()))
                    .await
                {
                    tracing::error!(
                        job_id = %job_id,
                        error = %write_err,
                        "Failed to record job failure",
                    );
                }
            }
        }
    }

    async fn execute(&self, msg: &JobMessage) -> Result<String, PipelineError> {
        let job_id = msg.job_id;
        let request = &msg.request;
        self.store
            .update_status(job_id, JobStatus::Running, 0, None)
            .await?;

        // Stage 1: compose the prompt. Submission-time validation should
        // have caught a bad style id, but a stale row must fail cleanly.
        let recipe =
            style::lookup(&request.style_id).map_err(|e| PipelineError::Validation(e.to_string()))?;
        let prompt = prompt::compose(recipe, request);
        self.store.update_progress(job_id, PROGRESS_COMPOSED).await?;

        // Stage 2: pre-generation moderation of the freeform prompt.
        let user_text = request
            .user_prompt
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if let Some(text) = user_text {
            let verdict = self.gate.check_text(text).await?;
            if !verdict.allowed {
                let reason = verdict
                    .reason
                    .unwrap_or_else(|| DEFAULT_FLAGGED_REASON.to_string());
                return Err(PipelineError::Moderation(reason));
            }
        }
        self.store.update_progress(job_id, PROGRESS_MODERATED).await?;

        // Stage 3: fetch the source photo.
        let input = self.blobs.fetch(&msg.input_ref).await?;
        self.store
            .update_progress(job_id, PROGRESS_INPUT_FETCHED)
            .await?;

        // Stage 4: resolve the output shape.
        let size = style::resolve_output_size(recipe, request.output_size);

        // Stage 5: the long external call, with the ticker animating
        // displayed progress while we block.
        self.store
            .update_progress(job_id, PROGRESS_GENERATING)
            .await?;
        let generation_request = GenerationRequest {
            prompt,
            image: input.clone(),
            size,
            quality: request.quality,
            fidelity: request.fidelity,
        };
        let ticker = ProgressTicker::spawn(
            Arc::clone(&self.store),
            job_id,
            self.ticker.clone(),
            &self.cancel,
        );
        let generated = self.generator.generate(&generation_request).await;
        ticker.stop().await;
        let output = generated?;
        self.store.update_progress(job_id, PROGRESS_GENERATED).await?;

        // Stage 6: inspect the safety flags the provider sent inline.
        let verdict = self.gate.check_provider_flags(&output.flags);
        if !verdict.allowed {
            let reason = verdict
                .reason
                .unwrap_or_else(|| DEFAULT_FLAGGED_REASON.to_string());
            return Err(PipelineError::Moderation(reason));
        }

        // Stage 7: normalize to bytes, fetching URL results.
        let mut image = self.generator.resolve_image(&output.image).await?;

        // Stages 8-9: best-effort face work, only for eligible styles.
        let face_eligible = recipe.face_restorable;
        if request.face_restore && face_eligible {
            self.store
                .update_progress(job_id, PROGRESS_FACE_RESTORE_STARTED)
                .await?;
            let attempt = self.faces.restore(&input, &image).await;
            image = fail_open("face_restore", job_id, attempt, image);
            self.store
                .update_progress(job_id, PROGRESS_FACE_RESTORED)
                .await?;
        }
        if request.face_enhance && face_eligible {
            self.store
                .update_progress(job_id, PROGRESS_FACE_ENHANCE_STARTED)
                .await?;
            let attempt = self.faces.enhance(&image).await;
            image = fail_open("face_enhance", job_id, attempt, image);
            self.store
                .update_progress(job_id, PROGRESS_FACE_ENHANCED)
                .await?;
        }

        // Stage 10: persist the result and finish.
        let result_ref = self.blobs.store(&image).await?;
        self.store.set_result_ref(job_id, &result_ref).await?;
        self.store
            .update_status(job_id, JobStatus::Done, PROGRESS_COMPLETE, None)
            .await?;
        Ok(result_ref)
    }
}

/// Fail-open combinator for the best-effort stages: keep the new bytes on
/// success, otherwise log and continue with the previous ones.
fn fail_open(
    stage: &'static str,
    job_id: JobId,
    outcome: Result<Vec<u8>, ProviderError>,
    previous: Vec<u8>,
) -> Vec<u8> {
    match outcome {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                job_id = %job_id,
                stage,
                error = %e,
                "Best-effort stage failed; continuing with previous image",
            );
            previous
        }
    }
}
