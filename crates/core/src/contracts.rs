//! Collaborator contracts consumed by the pipeline.
//!
//! The record store, blob storage, moderation gate, and the two external
//! image services are abstract here; concrete implementations live in
//! the `db` and `provider` crates, and tests substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::job::{BatchRecord, JobRecord};
use crate::status::JobStatus;
use crate::style::{OutputSize, Quality};
use crate::types::{BatchId, JobId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Record store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: JobId },
}

/// Blob storage failures.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob I/O failed: {0}")]
    Io(String),
}

/// Moderation gate failures (the gate being unreachable, not a rejection).
#[derive(Debug, thiserror::Error)]
#[error("moderation gate failed: {0}")]
pub struct ModerationError(pub String);

/// External image service failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Non-2xx response; body text preserved for diagnostics.
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The bounded per-attempt timeout elapsed.
    #[error("provider call timed out")]
    Timeout,

    /// Network-level failure (connect, reset, DNS).
    #[error("provider request failed: {0}")]
    Network(String),

    /// The provider answered but the payload was unusable.
    #[error("provider response malformed: {0}")]
    Malformed(String),

    /// Terminal adapter error after exhausting all attempts.
    #[error("generation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ProviderError {
    /// Whether the retrying adapter may try again after this error.
    ///
    /// Throttling and server-side 5xx responses are transient, as are
    /// timeouts and network resets. Everything else fails immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => {
                matches!(*status, 429 | 500 | 502 | 503 | 504)
            }
            ProviderError::Timeout | ProviderError::Network(_) => true,
            ProviderError::Malformed(_) | ProviderError::RetriesExhausted { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Record store
// ---------------------------------------------------------------------------

/// Job/batch record store. The only shared mutable state in the system;
/// every mutation is a single-row upsert keyed by id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a fresh record. Must complete before the job is enqueued
    /// so status polling never misses a job the queue already owns.
    async fn create_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    /// Write status + progress (+ error for failures) in one update.
    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        progress: u8,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Write only the advisory progress value.
    async fn update_progress(&self, id: JobId, progress: u8) -> Result<(), StoreError>;

    /// Record the styled output pointer.
    async fn set_result_ref(&self, id: JobId, result_ref: &str) -> Result<(), StoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Delete a row. Returns `false` when no row existed.
    async fn delete_job(&self, id: JobId) -> Result<bool, StoreError>;

    /// All jobs currently in the given status, oldest first. Used by the
    /// startup requeue scan.
    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, StoreError>;

    async fn create_batch(&self, batch: &BatchRecord) -> Result<(), StoreError>;

    /// Ordered member ids for a batch, or `None` for an unknown batch.
    async fn get_batch_job_ids(&self, id: BatchId) -> Result<Option<Vec<JobId>>, StoreError>;
}

// ---------------------------------------------------------------------------
// Blob storage
// ---------------------------------------------------------------------------

/// Opaque-reference blob storage for source photos and styled outputs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, blob_ref: &str) -> Result<Vec<u8>, BlobError>;

    /// Store bytes and return a new opaque reference.
    async fn store(&self, bytes: &[u8]) -> Result<String, BlobError>;

    /// A URL a client can download the blob from.
    async fn signed_download_url(&self, blob_ref: &str) -> Result<String, BlobError>;

    /// Best-effort deletion; callers log and ignore failures.
    async fn delete(&self, blob_ref: &str) -> Result<(), BlobError>;
}

// ---------------------------------------------------------------------------
// Moderation gate
// ---------------------------------------------------------------------------

/// Reason used when a provider flags content without supplying a message.
pub const DEFAULT_FLAGGED_REASON: &str = "Generated content was flagged by the safety system";

/// Outcome of a moderation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub allowed: bool,
    /// Caller-facing reason; present when `allowed` is false.
    pub reason: Option<String>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Boolean content gate with a reason string. The classification logic
/// itself lives behind this trait.
#[async_trait]
pub trait ModerationGate: Send + Sync {
    /// Check a freeform user prompt before generation.
    async fn check_text(&self, text: &str) -> Result<Verdict, ModerationError>;

    /// Interpret the safety flags a generation response carried inline.
    /// Pure; no remote call is involved.
    fn check_provider_flags(&self, flags: &ProviderFlags) -> Verdict {
        if !flags.flagged {
            return Verdict::allow();
        }
        let reason = flags
            .message
            .clone()
            .unwrap_or_else(|| DEFAULT_FLAGGED_REASON.to_string());
        Verdict::deny(reason)
    }
}

// ---------------------------------------------------------------------------
// Generation provider
// ---------------------------------------------------------------------------

/// Safety signal embedded in a generation response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderFlags {
    pub flagged: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    pub message: Option<String>,
}

/// Request sent to the image-transformation provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Vec<u8>,
    pub size: OutputSize,
    pub quality: Quality,
    pub fidelity: f32,
}

/// A provider may answer with inline bytes or a fetchable reference.
#[derive(Debug, Clone)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    Url(String),
}

/// Normalized generation response.
#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub image: ImagePayload,
    pub flags: ProviderFlags,
}

/// The third-party image-transformation service.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationOutput, ProviderError>;

    /// Resolve a payload to raw bytes, fetching URL results.
    ///
    /// The default implementation handles the inline case only; HTTP-backed
    /// providers override it to download URL results.
    async fn resolve_image(&self, payload: &ImagePayload) -> Result<Vec<u8>, ProviderError> {
        match payload {
            ImagePayload::Bytes(bytes) => Ok(bytes.clone()),
            ImagePayload::Url(url) => Err(ProviderError::Malformed(format!(
                "provider returned a URL result but no resolver is configured: {url}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Face restoration
// ---------------------------------------------------------------------------

/// Best-effort face services. Every pipeline use is fail-open: errors are
/// logged and the previous image is kept.
#[async_trait]
pub trait FaceRestoreProvider: Send + Sync {
    /// Re-impose the face from `source` onto `target`.
    async fn restore(&self, source: &[u8], target: &[u8]) -> Result<Vec<u8>, ProviderError>;

    /// Refinement pass over a single image.
    async fn enhance(&self, image: &[u8]) -> Result<Vec<u8>, ProviderError>;
}
