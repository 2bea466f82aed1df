//! Job and batch records plus the submission payload.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::status::{JobStatus, PriorityClass};
use crate::style::{OutputSize, Quality};
use crate::types::{BatchId, JobId, Timestamp};

/// Longest accepted freeform prompt, in characters.
pub const MAX_USER_PROMPT_LEN: usize = 500;

/// Style parameters submitted with a job.
///
/// Persisted verbatim on the job row so that rows still `queued` after a
/// restart can be re-enqueued without the original HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StyleRequest {
    /// Style catalog id, e.g. `"watercolor"`.
    #[validate(length(min = 1, max = 64))]
    pub style_id: String,

    /// Stylization strength slider, `0.0..=1.0`.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_strength")]
    pub strength: f32,

    /// Detail level slider, `0.0..=1.0`.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_detail")]
    pub detail: f32,

    /// Keep the original background recognizable.
    #[serde(default)]
    pub preserve_background: bool,

    /// Push colors toward a more saturated palette.
    #[serde(default)]
    pub vivid_colors: bool,

    /// Optional freeform prompt appended after the recipe fragments.
    /// Subject to the pre-generation moderation gate. At most
    /// [`MAX_USER_PROMPT_LEN`] characters.
    #[validate(length(max = 500))]
    pub user_prompt: Option<String>,

    /// Caller-requested output size; the style default applies when absent.
    pub output_size: Option<OutputSize>,

    /// Rendering quality tier.
    #[serde(default)]
    pub quality: Quality,

    /// Face likeness preservation passed to the provider, `0.0..=1.0`.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_fidelity")]
    pub fidelity: f32,

    /// Re-impose the original subject's face onto the styled output.
    #[serde(default)]
    pub face_restore: bool,

    /// Run the refinement pass over the (possibly face-swapped) result.
    #[serde(default)]
    pub face_enhance: bool,
}

fn default_strength() -> f32 {
    0.75
}

fn default_detail() -> f32 {
    0.5
}

fn default_fidelity() -> f32 {
    0.8
}

/// One generation request and its lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    /// Advisory 0-100 display value. Non-decreasing while running, exactly
    /// 100 once terminal. Only `status` is authoritative.
    pub progress: u8,
    /// Opaque pointer to the uploaded source photo.
    pub input_ref: String,
    /// Opaque pointer to the styled output; set only when `Done`.
    pub result_ref: Option<String>,
    /// Human-readable failure reason; set only when `Failed`.
    pub error: Option<String>,
    pub priority: PriorityClass,
    pub request: StyleRequest,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// Build a fresh record in `Queued` state with progress 0.
    pub fn new(input_ref: String, request: StyleRequest, priority: PriorityClass) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new_v4(),
            status: JobStatus::Queued,
            progress: 0,
            input_ref,
            result_ref: None,
            error: None,
            priority,
            request,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An ordered, immutable group of jobs created together.
///
/// `job_ids` order is positional (it mirrors the submitted item order) and
/// never changes after creation. Status is always derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: BatchId,
    pub job_ids: Vec<JobId>,
    pub created_at: Timestamp,
}

impl BatchRecord {
    /// Build a fresh batch over an ordered list of job ids.
    pub fn new(job_ids: Vec<JobId>) -> Self {
        Self {
            id: BatchId::new_v4(),
            job_ids,
            created_at: Utc::now(),
        }
    }
}
