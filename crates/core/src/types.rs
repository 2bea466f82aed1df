//! Shared identifier and timestamp aliases.

/// Caller-visible job identifier.
pub type JobId = uuid::Uuid;

/// Caller-visible batch identifier.
pub type BatchId = uuid::Uuid;

/// UTC timestamp used on all persisted records.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
