//! End-to-end tests of the generation worker state machine against
//! in-memory collaborators.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use restyle_core::contracts::{
    BlobStore, FaceRestoreProvider, GenerationOutput, GenerationProvider, GenerationRequest,
    ImagePayload, JobStore, ModerationError, ModerationGate, ProviderError, ProviderFlags,
    StoreError, Verdict, DEFAULT_FLAGGED_REASON,
};
use restyle_core::job::{BatchRecord, JobRecord, StyleRequest};
use restyle_core::status::{JobStatus, PriorityClass};
use restyle_core::style::Quality;
use restyle_core::types::{BatchId, JobId};
use restyle_db::memory::{MemoryBlobStore, MemoryJobStore};
use restyle_pipeline::queue::JobMessage;
use restyle_pipeline::ticker::TickerConfig;
use restyle_pipeline::worker::GenerationWorker;
use restyle_provider::retry::{RetryConfig, RetryingGenerator};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct AllowAllGate;

#[async_trait]
impl ModerationGate for AllowAllGate {
    async fn check_text(&self, _text: &str) -> Result<Verdict, ModerationError> {
        Ok(Verdict::allow())
    }
}

/// Gate that rejects any prompt containing a blocked word.
struct BlocklistGate {
    blocked: &'static str,
}

#[async_trait]
impl ModerationGate for BlocklistGate {
    async fn check_text(&self, text: &str) -> Result<Verdict, ModerationError> {
        if text.contains(self.blocked) {
            Ok(Verdict::deny("Prompt contains disallowed content"))
        } else {
            Ok(Verdict::allow())
        }
    }
}

/// Generation provider scripted with a fixed outcome sequence. URL
/// payloads resolve to the URL string's bytes so tests can observe that
/// the resolution path ran.
struct ScriptedProvider {
    outcomes: Mutex<Vec<Result<GenerationOutput, ProviderError>>>,
    calls: AtomicU32,
}

impl ScriptedProvider {
    fn new(outcomes: Vec<Result<GenerationOutput, ProviderError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            calls: AtomicU32::new(0),
        }
    }

    fn succeeding_with(bytes: &[u8]) -> Self {
        Self::new(vec![Ok(inline_output(bytes))])
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GenerationOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().remove(0)
    }

    async fn resolve_image(&self, payload: &ImagePayload) -> Result<Vec<u8>, ProviderError> {
        match payload {
            ImagePayload::Bytes(bytes) => Ok(bytes.clone()),
            ImagePayload::Url(url) => Ok(url.as_bytes().to_vec()),
        }
    }
}

/// Face provider that errors on every call.
struct BrokenFaces {
    calls: AtomicU32,
}

impl BrokenFaces {
    fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
        }
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceRestoreProvider for BrokenFaces {
    async fn restore(&self, _source: &[u8], _target: &[u8]) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Timeout)
    }

    async fn enhance(&self, _image: &[u8]) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::Network("connection reset".into()))
    }
}

/// Store decorator that records every progress value written, so tests
/// can assert monotonicity across the whole run.
struct RecordingStore {
    inner: MemoryJobStore,
    progress_writes: Mutex<Vec<u8>>,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: MemoryJobStore::new(),
            progress_writes: Mutex::new(Vec::new()),
        }
    }

    fn writes(&self) -> Vec<u8> {
        self.progress_writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn create_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.inner.create_job(job).await
    }

    async fn update_status(
        &self,
        id: JobId,
        status: JobStatus,
        progress: u8,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.progress_writes.lock().unwrap().push(progress);
        self.inner.update_status(id, status, progress, error).await
    }

    async fn update_progress(&self, id: JobId, progress: u8) -> Result<(), StoreError> {
        self.progress_writes.lock().unwrap().push(progress);
        self.inner.update_progress(id, progress).await
    }

    async fn set_result_ref(&self, id: JobId, result_ref: &str) -> Result<(), StoreError> {
        self.inner.set_result_ref(id, result_ref).await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        self.inner.get_job(id).await
    }

    async fn delete_job(&self, id: JobId) -> Result<bool, StoreError> {
        self.inner.delete_job(id).await
    }

    async fn jobs_with_status(&self, status: JobStatus) -> Result<Vec<JobRecord>, StoreError> {
        self.inner.jobs_with_status(status).await
    }

    async fn create_batch(&self, batch: &BatchRecord) -> Result<(), StoreError> {
        self.inner.create_batch(batch).await
    }

    async fn get_batch_job_ids(&self, id: BatchId) -> Result<Option<Vec<JobId>>, StoreError> {
        self.inner.get_batch_job_ids(id).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn inline_output(bytes: &[u8]) -> GenerationOutput {
    GenerationOutput {
        image: ImagePayload::Bytes(bytes.to_vec()),
        flags: ProviderFlags::default(),
    }
}

fn unavailable() -> ProviderError {
    ProviderError::Status {
        status: 503,
        message: "service unavailable".into(),
    }
}

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

struct Harness {
    store: Arc<dyn JobStore>,
    blobs: Arc<MemoryBlobStore>,
    worker: GenerationWorker,
}

/// Build a worker over the given collaborators, seed the input blob, and
/// persist the job row the way submission would.
async fn harness(
    store: Arc<dyn JobStore>,
    gate: Arc<dyn ModerationGate>,
    generator: Arc<dyn GenerationProvider>,
    faces: Arc<dyn FaceRestoreProvider>,
    request: StyleRequest,
) -> (Harness, JobMessage) {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert("input-photo", b"original pixels".to_vec()).await;

    let job = JobRecord::new("input-photo".into(), request, PriorityClass::Standard);
    store.create_job(&job).await.unwrap();
    let msg = JobMessage::from(&job);

    let worker = GenerationWorker::new(
        Arc::clone(&store),
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        gate,
        generator,
        faces,
        TickerConfig::default(),
        CancellationToken::new(),
    );

    (
        Harness {
            store,
            blobs,
            worker,
        },
        msg,
    )
}

async fn job_after_run(h: &Harness, msg: JobMessage) -> JobRecord {
    let job_id = msg.job_id;
    h.worker.run_job(msg).await;
    h.store.get_job(job_id).await.unwrap().unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_ends_done_with_stored_result() {
    let provider = Arc::new(ScriptedProvider::succeeding_with(b"styled pixels"));
    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        request("watercolor"),
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(job.progress, 100);
    assert!(job.error.is_none());

    let result_ref = job.result_ref.expect("done job must carry a result ref");
    assert_eq!(h.blobs.fetch(&result_ref).await.unwrap(), b"styled pixels");
}

#[tokio::test]
async fn blocked_prompt_fails_without_invoking_the_provider() {
    let provider = Arc::new(ScriptedProvider::succeeding_with(b"unused"));
    let mut req = request("watercolor");
    req.user_prompt = Some("a portrait with gore everywhere".into());

    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(BlocklistGate { blocked: "gore" }),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        req,
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 100);
    let error = job.error.expect("failed job must carry an error");
    assert!(!error.is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn three_transient_provider_failures_fail_the_job() {
    let scripted = ScriptedProvider::new(vec![
        Err(unavailable()),
        Err(unavailable()),
        Err(unavailable()),
    ]);
    let adapter = Arc::new(RetryingGenerator::new(scripted, RetryConfig::default()));

    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&adapter) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        request("watercolor"),
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.progress, 100);
    let error = job.error.unwrap();
    assert!(error.contains("3 attempts"), "unexpected error: {error}");
}

#[tokio::test(start_paused = true)]
async fn third_attempt_success_completes_the_job() {
    let scripted = ScriptedProvider::new(vec![
        Err(unavailable()),
        Err(unavailable()),
        Ok(inline_output(b"third time lucky")),
    ]);
    let adapter = Arc::new(RetryingGenerator::new(scripted, RetryConfig::default()));

    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&adapter) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        request("watercolor"),
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Done);
    let result_ref = job.result_ref.unwrap();
    assert_eq!(
        h.blobs.fetch(&result_ref).await.unwrap(),
        b"third time lucky"
    );
}

#[tokio::test]
async fn broken_face_services_never_fail_an_eligible_job() {
    let provider = Arc::new(ScriptedProvider::succeeding_with(b"styled pixels"));
    let faces = Arc::new(BrokenFaces::new());
    let mut req = request("watercolor");
    req.face_restore = true;
    req.face_enhance = true;

    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::clone(&faces) as Arc<dyn FaceRestoreProvider>,
        req,
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(faces.call_count(), 2, "both face stages should have run");

    // The pre-enhancement bytes survived both failed stages.
    let result_ref = job.result_ref.unwrap();
    assert_eq!(h.blobs.fetch(&result_ref).await.unwrap(), b"styled pixels");
}

#[tokio::test]
async fn face_stages_are_skipped_for_ineligible_styles() {
    let provider = Arc::new(ScriptedProvider::succeeding_with(b"sketched"));
    let faces = Arc::new(BrokenFaces::new());
    let mut req = request("pencil-sketch");
    req.face_restore = true;
    req.face_enhance = true;

    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::clone(&faces) as Arc<dyn FaceRestoreProvider>,
        req,
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Done);
    assert_eq!(faces.call_count(), 0);
}

#[tokio::test]
async fn unknown_style_fails_the_job_cleanly() {
    let provider = Arc::new(ScriptedProvider::succeeding_with(b"unused"));
    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        request("not-a-style"),
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert!(error.contains("Unknown style id"), "unexpected error: {error}");
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn flagged_output_fails_with_the_provider_reason() {
    let flagged = GenerationOutput {
        image: ImagePayload::Bytes(b"flagged pixels".to_vec()),
        flags: ProviderFlags {
            flagged: true,
            categories: vec!["violence".into()],
            message: Some("depicts graphic violence".into()),
        },
    };
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(flagged)]));

    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        request("watercolor"),
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("depicts graphic violence"));
}

#[tokio::test]
async fn flagged_output_without_message_uses_the_default_reason() {
    let flagged = GenerationOutput {
        image: ImagePayload::Bytes(b"flagged pixels".to_vec()),
        flags: ProviderFlags {
            flagged: true,
            categories: Vec::new(),
            message: None,
        },
    };
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(flagged)]));

    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        request("watercolor"),
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some(DEFAULT_FLAGGED_REASON));
}

#[tokio::test]
async fn url_results_are_resolved_to_bytes() {
    let output = GenerationOutput {
        image: ImagePayload::Url("https://cdn.example/result.png".into()),
        flags: ProviderFlags::default(),
    };
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(output)]));

    let (h, msg) = harness(
        Arc::new(MemoryJobStore::new()),
        Arc::new(AllowAllGate),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        request("watercolor"),
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Done);
    let result_ref = job.result_ref.unwrap();
    // The scripted resolver returns the URL's bytes, proving the
    // resolution path ran instead of storing the reference itself.
    assert_eq!(
        h.blobs.fetch(&result_ref).await.unwrap(),
        b"https://cdn.example/result.png"
    );
}

#[tokio::test]
async fn progress_never_decreases_and_ends_at_one_hundred() {
    let recording = Arc::new(RecordingStore::new());
    let provider = Arc::new(ScriptedProvider::succeeding_with(b"styled pixels"));
    let mut req = request("watercolor");
    req.face_restore = true;
    req.face_enhance = true;

    let (h, msg) = harness(
        Arc::clone(&recording) as Arc<dyn JobStore>,
        Arc::new(AllowAllGate),
        Arc::clone(&provider) as Arc<dyn GenerationProvider>,
        Arc::new(BrokenFaces::new()),
        req,
    )
    .await;

    let job = job_after_run(&h, msg).await;
    assert_eq!(job.status, JobStatus::Done);

    let writes = recording.writes();
    assert_eq!(*writes.last().unwrap(), 100);
    assert!(
        writes.windows(2).all(|w| w[0] <= w[1]),
        "progress regressed: {writes:?}"
    );
}
