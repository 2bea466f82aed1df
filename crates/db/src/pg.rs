//! Postgres-backed job/batch record store.
//!
//! Every mutation is a single-row update keyed by id; the owning worker
//! is the only writer after creation, so no locking beyond the row
//! update itself is needed.

use async_trait::async_trait;
use sqlx::FromRow;

use restyle_core::contracts::{JobStore, StoreError};
use restyle_core::job::{BatchRecord, JobRecord, StyleRequest};
use restyle_core::status::{JobStatus, PriorityClass};
use restyle_core::types::{BatchId, JobId, Timestamp};

use crate::DbPool;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, status, progress, input_ref, result_ref, error, priority, request, \
    created_at, updated_at";

/// Raw `jobs` row; converted to [`JobRecord`] after parsing the string
/// and JSON columns.
#[derive(Debug, FromRow)]
struct JobRow {
    id: JobId,
    status: String,
    progress: i16,
    input_ref: String,
    result_ref: Option<String>,
    error: Option<String>,
    priority: String,
    request: serde_json::Value,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, StoreError> {
        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Query(format!("unknown job status '{}'", row.status)))?;
        let priority = PriorityClass::parse(&row.priority)
            .ok_or_else(|| StoreError::Query(format!("unknown priority '{}'", row.priority)))?;
        let request: StyleRequest = serde_json::from_value(row.request)
            .map_err(|e| StoreError::Query(format!("undecodable job request: {e}")))?;
        let progress = u8::try_from(row.progress)
            .map_err(|_| StoreError::Query(format!("progress out of range: {}", row.progress)))?;

        Ok(JobRecord {
            id: row.id,
            status,
            progress,
            input_ref: row.input_ref,
            result_ref: row.result_ref,
            error: row.error,
            priority,
            request,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

/// Job/batch record store over a Postgres pool.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        let request = serde_json::to_value(&job.request)
            .map_err(|e| StoreError::Query(format!("unencodable job request: {e}")))?;
        sqlx::query(
            "INSERT INTO jobs (id, status, progress, input_ref, priority, request, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.progress as i16)
        .bind(&job.input_ref)
        .bind(job.priority.as_str())
        .bind(request)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        progress: u8,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE jobs SET status = $2, progress = $3, error = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(progress as i16)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;
        Ok(())
    }

    async fn update_progress(&self, id: JobId, progress: u8) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET progress = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(progress as i16)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn set_result_ref(&self, id: JobId, result_ref: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET result_ref = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(result_ref)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        let row: Option<JobRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.map(JobRecord::try_from).transpose()
    }

    async fn delete_job(&self, id: JobId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs WHERE status = $1 ORDER BY created_at ASC"
        );
        let rows: Vec<JobRow> = sqlx::query_as(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.into_iter().map(JobRecord::try_from).collect()
    }

    async fn create_batch(&self, batch: &BatchRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO batches (id, job_ids, created_at) VALUES ($1, $2, $3)")
            .bind(batch.id)
            .bind(&batch.job_ids)
            .bind(batch.created_at)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }

    async fn get_batch_job_ids(&self, id: BatchId) -> Result<Option<Vec<JobId>>, StoreError> {
        sqlx::query_scalar("SELECT job_ids FROM batches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)
    }
}
