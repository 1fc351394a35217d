//! Bounded in-process job queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use sources_core::config::OverflowPolicy;
use sources_core::error::AppError;
use sources_core::result::AppResult;

use super::{JobSink, JobSource};
use crate::executor::JobExecutionError;
use crate::job::Job;

/// How long [`JobSource::next`] waits for a job before returning `None`.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// FIFO queue living in process memory. Jobs are lost on restart.
#[derive(Debug)]
pub struct MemoryQueue {
    jobs: Mutex<VecDeque<Arc<dyn Job>>>,
    capacity: usize,
    policy: OverflowPolicy,
    not_empty: Notify,
    not_full: Notify,
    poll_interval: Duration,
}

impl MemoryQueue {
    /// Create a queue holding at most `capacity` jobs.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            policy,
            not_empty: Notify::new(),
            not_full: Notify::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override how long `next` waits for a job.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Remove and return every queued job.
    pub async fn drain(&self) -> Vec<Arc<dyn Job>> {
        let drained: Vec<_> = self.jobs.lock().await.drain(..).collect();
        if !drained.is_empty() {
            self.not_full.notify_waiters();
        }
        drained
    }

    fn push(&self, jobs: &mut VecDeque<Arc<dyn Job>>, job: Arc<dyn Job>) {
        jobs.push_back(job);
        self.not_empty.notify_one();
    }
}

#[async_trait]
impl JobSink for MemoryQueue {
    async fn enqueue(&self, job: Arc<dyn Job>) -> AppResult<()> {
        loop {
            let notified = self.not_full.notified();
            {
                let mut jobs = self.jobs.lock().await;
                if jobs.len() < self.capacity {
                    tracing::info!(job = job.name(), "Job submitted");
                    self.push(&mut jobs, job);
                    return Ok(());
                }

                match self.policy {
                    OverflowPolicy::Block => {}
                    OverflowPolicy::DropOldest => {
                        if let Some(dropped) = jobs.pop_front() {
                            tracing::warn!(
                                dropped = dropped.name(),
                                job = job.name(),
                                "Queue full, dropping oldest job"
                            );
                        }
                        self.push(&mut jobs, job);
                        return Ok(());
                    }
                    OverflowPolicy::Reject => {
                        tracing::warn!(job = job.name(), "Queue full, rejecting job");
                        return Err(AppError::service_unavailable(format!(
                            "job queue is full ({} jobs)",
                            self.capacity
                        )));
                    }
                }
            }
            notified.await;
        }
    }

    async fn enqueue_follow_up(&self, job: Arc<dyn Job>) -> AppResult<()> {
        if self.policy != OverflowPolicy::Block {
            return self.enqueue(job).await;
        }
        let mut jobs = self.jobs.lock().await;
        if jobs.len() >= self.capacity {
            tracing::debug!(
                job = job.name(),
                queued = jobs.len(),
                "Queue full, accepting follow-up job over capacity"
            );
        }
        tracing::info!(job = job.name(), "Job submitted");
        self.push(&mut jobs, job);
        Ok(())
    }
}

#[async_trait]
impl JobSource for MemoryQueue {
    async fn next(&self) -> Result<Option<Arc<dyn Job>>, JobExecutionError> {
        loop {
            let notified = self.not_empty.notified();
            if let Some(job) = self.jobs.lock().await.pop_front() {
                self.not_full.notify_one();
                tracing::debug!(job = job.name(), "Job dequeued");
                return Ok(Some(job));
            }
            if tokio::time::timeout(self.poll_interval, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn len(&self) -> AppResult<u64> {
        Ok(self.jobs.lock().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingJob;

    fn job(tag: u64) -> Arc<dyn Job> {
        Arc::new(RecordingJob::new(Duration::from_secs(tag)))
    }

    async fn tags(queue: &MemoryQueue) -> Vec<u64> {
        queue
            .drain()
            .await
            .iter()
            .map(|j| j.delay().as_secs())
            .collect()
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = MemoryQueue::new(8, OverflowPolicy::Block);
        for tag in 1..=3 {
            queue.enqueue(job(tag)).await.unwrap();
        }
        let first = queue.next().await.unwrap().unwrap();
        assert_eq!(first.delay().as_secs(), 1);
        assert_eq!(tags(&queue).await, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_drop_oldest_keeps_newest() {
        let queue = MemoryQueue::new(2, OverflowPolicy::DropOldest);
        for tag in 1..=3 {
            queue.enqueue(job(tag)).await.unwrap();
        }
        assert_eq!(tags(&queue).await, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_reject_when_full() {
        let queue = MemoryQueue::new(1, OverflowPolicy::Reject);
        queue.enqueue(job(1)).await.unwrap();
        assert!(queue.enqueue(job(2)).await.is_err());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_waits_for_room() {
        let queue = Arc::new(MemoryQueue::new(1, OverflowPolicy::Block));
        queue.enqueue(job(1)).await.unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.enqueue(job(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!producer.is_finished());

        let first = queue.next().await.unwrap().unwrap();
        assert_eq!(first.delay().as_secs(), 1);
        producer.await.unwrap().unwrap();
        assert_eq!(tags(&queue).await, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_up_never_waits_for_room() {
        let queue = MemoryQueue::new(1, OverflowPolicy::Block);
        queue.enqueue(job(1)).await.unwrap();

        tokio::time::timeout(Duration::from_secs(1), queue.enqueue_follow_up(job(2)))
            .await
            .expect("follow-up enqueue waited for room")
            .unwrap();
        assert_eq!(tags(&queue).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_follow_up_still_rejected_under_reject_policy() {
        let queue = MemoryQueue::new(1, OverflowPolicy::Reject);
        queue.enqueue(job(1)).await.unwrap();
        assert!(queue.enqueue_follow_up(job(2)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_times_out_when_empty() {
        let queue = MemoryQueue::new(1, OverflowPolicy::Block)
            .with_poll_interval(Duration::from_millis(200));
        assert!(queue.next().await.unwrap().is_none());
    }
}
