//! Bounded worker pool.
//!
//! A fixed number of tasks loop on the queue; each owns the jobs it
//! dequeues for their entire lifetime. Shutdown is a drain: closing the
//! queue makes every `pop` return `None`, the loops exit after finishing
//! their in-flight job, and [`WorkerPool::join`] waits for all of them.

use std::sync::Arc;

use crate::queue::JobQueue;
use crate::worker::GenerationWorker;

/// Tunable parameters for the pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of concurrent worker tasks.
    pub width: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { width: 3 }
    }
}

/// Handle to the running worker tasks.
pub struct WorkerPool {
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.width` worker tasks over a shared queue and worker.
    pub fn start(queue: Arc<JobQueue>, worker: Arc<GenerationWorker>, config: PoolConfig) -> Self {
        let handles = (0..config.width)
            .map(|index| {
                let queue = Arc::clone(&queue);
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    worker_loop(index, queue, worker).await;
                })
            })
            .collect();
        Self { handles }
    }

    /// Wait for every worker task to finish. Call after closing the
    /// queue; in-flight jobs run to their terminal state first.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
    }
}

async fn worker_loop(index: usize, queue: Arc<JobQueue>, worker: Arc<GenerationWorker>) {
    tracing::info!(worker = index, "Generation worker started");
    while let Some(msg) = queue.pop().await {
        tracing::debug!(
            worker = index,
            job_id = %msg.job_id,
            priority = msg.priority.as_str(),
            "Job dequeued",
        );
        worker.run_job(msg).await;
    }
    tracing::info!(worker = index, "Generation worker stopped");
}
