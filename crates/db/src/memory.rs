//! In-memory store implementations for tests and local development.
//!
//! Behaviorally equivalent to the Postgres store for everything the
//! pipeline observes: keyed single-row updates, missing rows reported as
//! `None`, oldest-first status scans.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use restyle_core::contracts::{BlobError, BlobStore, JobStore, StoreError};
use restyle_core::job::{BatchRecord, JobRecord};
use restyle_core::status::JobStatus;
use restyle_core::types::{BatchId, JobId};

/// HashMap-backed [`JobStore`].
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    batches: RwLock<HashMap<BatchId, BatchRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        progress: u8,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.status = status;
            job.progress = progress;
            job.error = error.map(str::to_string);
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_progress(&self, id: JobId, progress: u8) -> Result<(), StoreError> {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.progress = progress;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_result_ref(&self, id: JobId, result_ref: &str) -> Result<(), StoreError> {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.result_ref = Some(result_ref.to_string());
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn delete_job(&self, id: JobId) -> Result<bool, StoreError> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }

    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, StoreError> {
        let mut jobs: Vec<JobRecord> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn create_batch(&self, batch: &BatchRecord) -> Result<(), StoreError> {
        self.batches.write().await.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn get_batch_job_ids(&self, id: BatchId) -> Result<Option<Vec<JobId>>, StoreError> {
        Ok(self
            .batches
            .read()
            .await
            .get(&id)
            .map(|batch| batch.job_ids.clone()))
    }
}

/// HashMap-backed [`BlobStore`].
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    counter: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a blob under a chosen reference, for seeding test inputs.
    pub async fn insert(&self, blob_ref: &str, bytes: Vec<u8>) {
        self.blobs.write().await.insert(blob_ref.to_string(), bytes);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn fetch(&self, blob_ref: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .read()
            .await
            .get(blob_ref)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(blob_ref.to_string()))
    }

    async fn store(&self, bytes: &[u8]) -> Result<String, BlobError> {
        let blob_ref = format!("mem-{}", self.counter.fetch_add(1, Ordering::Relaxed));
        self.blobs
            .write()
            .await
            .insert(blob_ref.clone(), bytes.to_vec());
        Ok(blob_ref)
    }

    async fn signed_download_url(&self, blob_ref: &str) -> Result<String, BlobError> {
        if !self.blobs.read().await.contains_key(blob_ref) {
            return Err(BlobError::NotFound(blob_ref.to_string()));
        }
        Ok(format!("memory://{blob_ref}"))
    }

    async fn delete(&self, blob_ref: &str) -> Result<(), BlobError> {
        self.blobs.write().await.remove(blob_ref);
        Ok(())
    }
}
