//! Tests for the submission service, batch aggregation service, and the
//! startup requeue scan, against the in-memory store.

use std::sync::Arc;

use assert_matches::assert_matches;

use restyle_core::contracts::JobStore;
use restyle_core::job::{BatchRecord, StyleRequest};
use restyle_core::status::{BatchStatus, JobStatus, PriorityClass};
use restyle_core::style::Quality;
use restyle_core::types::{BatchId, JobId};
use restyle_db::memory::MemoryJobStore;
use restyle_pipeline::queue::JobQueue;
use restyle_pipeline::service::{
    requeue_pending, BatchStatusService, SubmitError, SubmitService,
};

fn request(style_id: &str) -> StyleRequest {
    StyleRequest {
        style_id: style_id.into(),
        strength: 0.75,
        detail: 0.5,
        preserve_background: false,
        vivid_colors: false,
        user_prompt: None,
        output_size: None,
        quality: Quality::Standard,
        fidelity: 0.8,
        face_restore: false,
        face_enhance: false,
    }
}

fn services() -> (Arc<MemoryJobStore>, Arc<JobQueue>, SubmitService) {
    let store = Arc::new(MemoryJobStore::new());
    let queue = Arc::new(JobQueue::new());
    let submit = SubmitService::new(
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::clone(&queue),
    );
    (store, queue, submit)
}

#[tokio::test]
async fn submit_persists_the_row_and_enqueues_one_message() {
    let (store, queue, submit) = services();

    let job_id = submit
        .submit("photo-1".into(), request("watercolor"), PriorityClass::Standard)
        .await
        .unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn duplicate_submissions_produce_independent_rows() {
    let (store, _queue, submit) = services();

    let first = submit
        .submit("photo-1".into(), request("watercolor"), PriorityClass::Standard)
        .await
        .unwrap();
    let second = submit
        .submit("photo-1".into(), request("watercolor"), PriorityClass::Standard)
        .await
        .unwrap();

    assert_ne!(first, second);
    assert!(store.get_job(first).await.unwrap().is_some());
    assert!(store.get_job(second).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_style_is_rejected_at_submission() {
    let (_store, _queue, submit) = services();
    let result = submit
        .submit("photo-1".into(), request("vaporwave"), PriorityClass::Standard)
        .await;
    assert_matches!(result, Err(SubmitError::Validation(_)));
}

#[tokio::test]
async fn out_of_range_slider_is_rejected_at_submission() {
    let (_store, _queue, submit) = services();
    let mut req = request("watercolor");
    req.strength = 2.0;
    let result = submit
        .submit("photo-1".into(), req, PriorityClass::Standard)
        .await;
    assert_matches!(result, Err(SubmitError::Validation(_)));
}

#[tokio::test]
async fn submit_after_close_reports_draining() {
    let (store, queue, submit) = services();
    queue.close();

    let result = submit
        .submit("photo-1".into(), request("watercolor"), PriorityClass::Standard)
        .await;
    assert_matches!(result, Err(SubmitError::Draining));

    // The row was persisted before the push and stays queued for the
    // next startup scan.
    let queued = store.jobs_with_status(JobStatus::Queued).await.unwrap();
    assert_eq!(queued.len(), 1);
}

#[tokio::test]
async fn batch_creation_preserves_member_order() {
    let (store, _queue, submit) = services();

    let batch = submit
        .create_batch(
            vec![
                ("photo-1".into(), request("watercolor")),
                ("photo-2".into(), request("anime")),
                ("photo-3".into(), request("pop-art")),
            ],
            PriorityClass::Premium,
        )
        .await
        .unwrap();

    assert_eq!(batch.job_ids.len(), 3);
    let first = store.get_job(batch.job_ids[0]).await.unwrap().unwrap();
    assert_eq!(first.input_ref, "photo-1");
    let third = store.get_job(batch.job_ids[2]).await.unwrap().unwrap();
    assert_eq!(third.input_ref, "photo-3");
}

#[tokio::test]
async fn mixed_terminal_batch_reports_partial_failure() {
    let (store, _queue, submit) = services();
    let batch = submit
        .create_batch(
            vec![
                ("photo-1".into(), request("watercolor")),
                ("photo-2".into(), request("watercolor")),
                ("photo-3".into(), request("watercolor")),
            ],
            PriorityClass::Standard,
        )
        .await
        .unwrap();

    let job_store: Arc<dyn JobStore> = Arc::clone(&store) as Arc<dyn JobStore>;
    job_store
        .update_status(batch.job_ids[0], JobStatus::Done, 100, None)
        .await
        .unwrap();
    job_store
        .update_status(batch.job_ids[1], JobStatus::Done, 100, None)
        .await
        .unwrap();
    job_store
        .update_status(batch.job_ids[2], JobStatus::Failed, 100, Some("provider down"))
        .await
        .unwrap();

    let view = BatchStatusService::new(job_store)
        .batch_status(batch.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(view.rollup.status, BatchStatus::PartialFailure);
    assert_eq!(view.rollup.completed_jobs, 2);
    assert_eq!(view.rollup.failed_jobs, 1);
    assert_eq!(view.rollup.overall_progress, 100);
}

#[tokio::test]
async fn missing_member_row_reads_as_queued_and_keeps_the_batch_processing() {
    let store = Arc::new(MemoryJobStore::new());
    let job_store: Arc<dyn JobStore> = Arc::clone(&store) as Arc<dyn JobStore>;

    // A batch referencing a job whose row is not visible yet.
    let ghost = JobId::new_v4();
    let batch = BatchRecord::new(vec![ghost]);
    job_store.create_batch(&batch).await.unwrap();

    let view = BatchStatusService::new(job_store)
        .batch_status(batch.id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(view.rollup.status, BatchStatus::Processing);
    assert_eq!(view.jobs.len(), 1);
    assert_eq!(view.jobs[0].status, JobStatus::Queued);
    assert_eq!(view.jobs[0].progress, 0);
}

#[tokio::test]
async fn unknown_batch_reads_as_none() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let view = BatchStatusService::new(store)
        .batch_status(BatchId::new_v4())
        .await
        .unwrap();
    assert!(view.is_none());
}

#[tokio::test]
async fn requeue_restores_queued_rows_and_leaves_running_ones() {
    let (store, _queue, submit) = services();

    submit
        .submit("photo-1".into(), request("watercolor"), PriorityClass::Standard)
        .await
        .unwrap();
    let stuck = submit
        .submit("photo-2".into(), request("watercolor"), PriorityClass::Standard)
        .await
        .unwrap();

    let job_store: Arc<dyn JobStore> = Arc::clone(&store) as Arc<dyn JobStore>;
    job_store
        .update_status(stuck, JobStatus::Running, 50, None)
        .await
        .unwrap();

    // A fresh queue, as after a restart.
    let fresh_queue = JobQueue::new();
    let count = requeue_pending(&job_store, &fresh_queue).await.unwrap();

    assert_eq!(count, 1);
    assert_eq!(fresh_queue.len(), 1);
}
