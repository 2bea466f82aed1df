//! Simulated-progress ticker for the long generation call.
//!
//! The external generation call takes tens of seconds with no usable
//! progress signal. While the worker is blocked on it, this task
//! periodically nudges the job's displayed progress so polling clients
//! see a moving value, without ever claiming real completion. One ticker
//! per job, started right before the generation call and cancelled the
//! instant it resolves.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use restyle_core::contracts::JobStore;
use restyle_core::progress::next_simulated_progress;
use restyle_core::status::JobStatus;
use restyle_core::types::JobId;

/// Tunable parameters for the ticker.
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Wakeup period between progress nudges.
    pub interval: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(4),
        }
    }
}

/// Handle to a running ticker task.
pub struct ProgressTicker {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl ProgressTicker {
    /// Spawn the ticker for one job. The token is a child of `parent`,
    /// so process shutdown also stops the ticker.
    pub fn spawn(
        store: Arc<dyn JobStore>,
        job_id: JobId,
        config: TickerConfig,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run(store, job_id, config, task_cancel).await;
        });
        Self { cancel, handle }
    }

    /// Cancel the ticker and wait for the task to finish, so no tick can
    /// race the worker's next checkpoint write.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Progress ticker task panicked");
        }
    }
}

async fn run(
    store: Arc<dyn JobStore>,
    job_id: JobId,
    config: TickerConfig,
    cancel: CancellationToken,
) {
    // First nudge one full interval in, not immediately: the worker has
    // just written the generation checkpoint itself.
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match store.get_job(job_id).await {
                    Ok(Some(job)) if job.status == JobStatus::Running => {
                        if let Some(next) = next_simulated_progress(job.progress) {
                            if let Err(e) = store.update_progress(job_id, next).await {
                                tracing::warn!(job_id = %job_id, error = %e, "Progress tick write failed");
                            }
                        }
                    }
                    // Deleted out-of-band or already terminal; nothing to animate.
                    Ok(_) => break,
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, error = %e, "Progress tick read failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restyle_core::job::{JobRecord, StyleRequest};
    use restyle_core::progress::{PROGRESS_GENERATING, SIMULATED_PROGRESS_CAP};
    use restyle_core::status::PriorityClass;
    use restyle_core::style::Quality;
    use restyle_db::memory::MemoryJobStore;

    fn running_job() -> JobRecord {
        let request = StyleRequest {
            style_id: "watercolor".into(),
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
        };
        let mut job = JobRecord::new("blob-in".into(), request, PriorityClass::Standard);
        job.status = JobStatus::Running;
        job.progress = PROGRESS_GENERATING;
        job
    }

    #[tokio::test(start_paused = true)]
    async fn progress_climbs_and_tops_out_below_the_cap() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let job = running_job();
        store.create_job(&job).await.unwrap();

        let parent = CancellationToken::new();
        let config = TickerConfig {
            interval: Duration::from_secs(4),
        };
        let ticker = ProgressTicker::spawn(Arc::clone(&store), job.id, config, &parent);

        // One interval: 50 -> 53.
        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert_eq!(store.get_job(job.id).await.unwrap().unwrap().progress, 53);

        // Far more intervals than needed to reach the cap.
        tokio::time::sleep(Duration::from_secs(300)).await;
        let progress = store.get_job(job.id).await.unwrap().unwrap().progress;
        assert_eq!(progress, 77);
        assert!(progress < SIMULATED_PROGRESS_CAP);

        ticker.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_ticking_immediately() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let job = running_job();
        store.create_job(&job).await.unwrap();

        let parent = CancellationToken::new();
        let config = TickerConfig {
            interval: Duration::from_secs(4),
        };
        let ticker = ProgressTicker::spawn(Arc::clone(&store), job.id, config, &parent);

        tokio::time::sleep(Duration::from_millis(4100)).await;
        ticker.stop().await;
        let frozen = store.get_job(job.id).await.unwrap().unwrap().progress;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            store.get_job(job.id).await.unwrap().unwrap().progress,
            frozen
        );
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_job_is_left_alone() {
        let store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
        let mut job = running_job();
        job.status = JobStatus::Done;
        job.progress = 100;
        store.create_job(&job).await.unwrap();

        let parent = CancellationToken::new();
        let ticker = ProgressTicker::spawn(
            Arc::clone(&store),
            job.id,
            TickerConfig::default(),
            &parent,
        );

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.get_job(job.id).await.unwrap().unwrap().progress, 100);
        ticker.stop().await;
    }
}
