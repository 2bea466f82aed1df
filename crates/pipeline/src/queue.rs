//! In-process priority job queue.
//!
//! Two sub-queues (premium / standard) behind one mutex. Dequeue prefers
//! premium, but after [`PREMIUM_BURST`] consecutive premium pops a
//! waiting standard message is serviced first, so the lower class is
//! never starved indefinitely. There is no queue-level redelivery: all
//! retry behavior lives inside the generation adapter, and rows left
//! `queued` by a crash are re-enqueued at startup.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use restyle_core::job::{JobRecord, StyleRequest};
use restyle_core::status::PriorityClass;
use restyle_core::types::JobId;

/// Consecutive premium dequeues allowed before a waiting standard
/// message is serviced.
pub const PREMIUM_BURST: u32 = 4;

/// Message delivered to a worker for one job.
#[derive(Debug, Clone)]
pub struct JobMessage {
    pub job_id: JobId,
    pub input_ref: String,
    pub request: StyleRequest,
    pub priority: PriorityClass,
}

impl From<&JobRecord> for JobMessage {
    fn from(job: &JobRecord) -> Self {
        Self {
            job_id: job.id,
            input_ref: job.input_ref.clone(),
            request: job.request.clone(),
            priority: job.priority,
        }
    }
}

/// The queue refused a push because shutdown has begun.
#[derive(Debug, thiserror::Error)]
#[error("job queue is closed")]
pub struct QueueClosed;

#[derive(Default)]
struct Inner {
    premium: VecDeque<JobMessage>,
    standard: VecDeque<JobMessage>,
    premium_streak: u32,
    closed: bool,
}

impl Inner {
    fn take(&mut self) -> Option<JobMessage> {
        if self.premium_streak >= PREMIUM_BURST {
            if let Some(msg) = self.standard.pop_front() {
                self.premium_streak = 0;
                return Some(msg);
            }
        }
        if let Some(msg) = self.premium.pop_front() {
            self.premium_streak += 1;
            return Some(msg);
        }
        if let Some(msg) = self.standard.pop_front() {
            self.premium_streak = 0;
            return Some(msg);
        }
        None
    }
}

/// Priority-capable work queue feeding the worker pool.
#[derive(Default)]
pub struct JobQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message. Fails once [`close`](Self::close) has been
    /// called; the caller leaves the job row `queued` for the next
    /// startup scan.
    pub fn push(&self, msg: JobMessage) -> Result<(), QueueClosed> {
        {
            let mut inner = self.inner.lock().expect("queue mutex poisoned");
            if inner.closed {
                return Err(QueueClosed);
            }
            match msg.priority {
                PriorityClass::Premium => inner.premium.push_back(msg),
                PriorityClass::Standard => inner.standard.push_back(msg),
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Wait for the next message. Returns `None` once the queue is
    /// closed; messages still enqueued at that point are abandoned (their
    /// rows stay `queued` and are re-enqueued at the next startup).
    pub async fn pop(&self) -> Option<JobMessage> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().expect("queue mutex poisoned");
                if inner.closed {
                    return None;
                }
                if let Some(msg) = inner.take() {
                    return Some(msg);
                }
            }
            notified.await;
        }
    }

    /// Begin shutdown: reject further pushes and wake every waiting
    /// worker so it can observe the close.
    pub fn close(&self) {
        self.inner.lock().expect("queue mutex poisoned").closed = true;
        self.notify.notify_waiters();
    }

    /// Messages currently waiting across both lanes.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("queue mutex poisoned");
        inner.premium.len() + inner.standard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restyle_core::job::JobRecord;
    use restyle_core::style::Quality;
    use std::sync::Arc;
    use std::time::Duration;

    fn message(priority: PriorityClass) -> JobMessage {
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
        JobMessage::from(&JobRecord::new("blob-in".into(), request, priority))
    }

    #[tokio::test]
    async fn premium_is_preferred_when_both_wait() {
        let queue = JobQueue::new();
        let standard = message(PriorityClass::Standard);
        let premium = message(PriorityClass::Premium);
        queue.push(standard.clone()).unwrap();
        queue.push(premium.clone()).unwrap();

        assert_eq!(queue.pop().await.unwrap().job_id, premium.job_id);
        assert_eq!(queue.pop().await.unwrap().job_id, standard.job_id);
    }

    #[tokio::test]
    async fn standard_is_serviced_under_sustained_premium_load() {
        let queue = JobQueue::new();
        let standard = message(PriorityClass::Standard);
        queue.push(standard.clone()).unwrap();
        for _ in 0..10 {
            queue.push(message(PriorityClass::Premium)).unwrap();
        }

        // The standard message must surface within the burst window, not
        // after all ten premium messages.
        let mut position = None;
        for i in 0..11 {
            if queue.pop().await.unwrap().job_id == standard.job_id {
                position = Some(i);
                break;
            }
        }
        assert_eq!(position, Some(PREMIUM_BURST as usize));
    }

    #[tokio::test]
    async fn pop_blocks_until_a_push_arrives() {
        let queue = Arc::new(JobQueue::new());
        let popper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        // Give the popper a chance to park.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let msg = message(PriorityClass::Standard);
        queue.push(msg.clone()).unwrap();

        let received = popper.await.unwrap().unwrap();
        assert_eq!(received.job_id, msg.job_id);
    }

    #[tokio::test]
    async fn close_rejects_pushes_and_drains_pops_to_none() {
        let queue = JobQueue::new();
        queue.push(message(PriorityClass::Standard)).unwrap();
        queue.close();

        assert!(queue.push(message(PriorityClass::Standard)).is_err());
        // Remaining messages are abandoned for the startup requeue scan.
        assert!(queue.pop().await.is_none());
    }

    #[tokio::test]
    async fn close_wakes_parked_workers() {
        let queue = Arc::new(JobQueue::new());
        let popper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();
        assert!(popper.await.unwrap().is_none());
    }
}
