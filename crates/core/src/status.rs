//! Job and batch lifecycle enums.
//!
//! Statuses are persisted by name (lowercase strings), so every enum here
//! carries a stable `as_str` / `parse` pair. `parse` is what the record
//! store uses when rehydrating rows; an unknown name is a data error, not
//! a panic.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single generation job.
///
/// Transitions are monotonic: `Queued -> Running -> {Done | Failed}`.
/// A job never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Persisted, waiting for a worker to dequeue it.
    Queued,
    /// Owned by a worker; pipeline stages are executing.
    Running,
    /// Finished successfully; `result_ref` is set.
    Done,
    /// Finished unsuccessfully; `error` is set and non-empty.
    Failed,
}

impl JobStatus {
    /// Stable string form used in the record store and API responses.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "done" => Some(JobStatus::Done),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// Derived status of a batch. Never stored; always computed from the
/// member jobs at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// At least one member job is still non-terminal.
    Processing,
    /// Every member finished and none failed.
    Done,
    /// Every member finished and at least one failed.
    PartialFailure,
}

impl BatchStatus {
    /// Stable string form used in API responses.
    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Processing => "processing",
            BatchStatus::Done => "done",
            BatchStatus::PartialFailure => "partial_failure",
        }
    }
}

/// Queue priority class for a submission.
///
/// Premium messages are dequeued preferentially, but the queue services
/// standard messages periodically so neither class starves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    Premium,
    Standard,
}

impl PriorityClass {
    /// Stable string form used in the record store.
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityClass::Premium => "premium",
            PriorityClass::Standard => "standard",
        }
    }

    /// Parse the stable string form. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "premium" => Some(PriorityClass::Premium),
            "standard" => Some(PriorityClass::Standard),
            _ => None,
        }
    }
}

impl Default for PriorityClass {
    fn default() -> Self {
        PriorityClass::Standard
    }
}
