//! Bounded holding area for dequeued jobs whose delay has not elapsed yet.
//!
//! Timers run on a [`tokio_util::time::DelayQueue`]. The jobs are kept by
//! arrival id next to it so the ones still waiting can be handed back when
//! the worker stops.

use std::collections::BTreeMap;
use std::future::poll_fn;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::time::DelayQueue;

use crate::job::Job;

/// Jobs parked until their delay elapsed.
#[derive(Debug)]
pub struct DelayedJobs {
    timers: DelayQueue<u64>,
    jobs: BTreeMap<u64, Arc<dyn Job>>,
    capacity: usize,
    next_id: u64,
}

impl DelayedJobs {
    /// Create a holding area for at most `capacity` jobs.
    pub fn new(capacity: usize) -> Self {
        Self {
            timers: DelayQueue::new(),
            jobs: BTreeMap::new(),
            capacity: capacity.max(1),
            next_id: 0,
        }
    }

    /// Park `job` for `delay`. Hands the job back when the area is full.
    pub fn insert(&mut self, job: Arc<dyn Job>, delay: Duration) -> Result<(), Arc<dyn Job>> {
        if self.is_full() {
            return Err(job);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert(id, delay);
        self.jobs.insert(id, job);
        Ok(())
    }

    /// Wait for the next job whose delay elapsed.
    ///
    /// Resolves to `None` immediately when nothing is parked.
    pub async fn next_due(&mut self) -> Option<Arc<dyn Job>> {
        loop {
            let expired = poll_fn(|cx| self.timers.poll_expired(cx)).await?;
            if let Some(job) = self.jobs.remove(expired.get_ref()) {
                return Some(job);
            }
        }
    }

    /// Remove every parked job, in arrival order.
    pub fn drain(&mut self) -> Vec<Arc<dyn Job>> {
        self.timers.clear();
        std::mem::take(&mut self.jobs).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;
    use crate::testing::RecordingJob;

    fn job(secs: u64) -> Arc<dyn Job> {
        Arc::new(RecordingJob::new(Duration::from_secs(secs)))
    }

    fn secs(jobs: &[Arc<dyn Job>]) -> Vec<u64> {
        jobs.iter().map(|j| j.delay().as_secs()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_come_out_in_due_order() {
        let start = Instant::now();
        let mut delayed = DelayedJobs::new(8);
        for secs in [30, 10, 20] {
            let job = job(secs);
            let delay = job.delay();
            delayed.insert(job, delay).unwrap();
        }

        let first = delayed.next_due().await.unwrap();
        assert_eq!(first.delay().as_secs(), 10);
        assert!(start.elapsed() >= Duration::from_secs(10));

        let second = delayed.next_due().await.unwrap();
        assert_eq!(second.delay().as_secs(), 20);
        assert_eq!(delayed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_resolves_to_none() {
        let mut delayed = DelayedJobs::new(1);
        assert!(delayed.next_due().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_hands_job_back_and_drain_empties() {
        let mut delayed = DelayedJobs::new(2);
        delayed.insert(job(5), Duration::from_secs(50)).unwrap();
        delayed.insert(job(1), Duration::from_secs(10)).unwrap();

        let rejected = delayed.insert(job(9), Duration::from_secs(1)).unwrap_err();
        assert_eq!(rejected.delay().as_secs(), 9);
        assert!(delayed.is_full());

        assert_eq!(secs(&delayed.drain()), vec![5, 1]);
        assert!(delayed.is_empty());
        assert!(delayed.next_due().await.is_none());
    }
}
