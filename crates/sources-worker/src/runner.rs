//! Worker runner: pulls jobs off the queue, holds each one until its delay
//! elapsed, then executes it on a bounded pool.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use sources_core::config::WorkerConfig;

use crate::delay::DelayedJobs;
use crate::executor::{JobExecutionError, JobExecutor};
use crate::job::Job;
use crate::queue::{JobSink, JobSource};

/// Jobs buffered between the consumer task and the dispatch loop, and the
/// most ready jobs the loop holds before it stops taking new ones.
const HANDOFF_CAPACITY: usize = 32;

/// Pause after a failed dequeue before trying again.
const DEQUEUE_BACKOFF: Duration = Duration::from_secs(1);

/// How long shutdown waits for in-flight jobs.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Main worker runner.
#[derive(Debug)]
pub struct WorkerRunner {
    source: Arc<dyn JobSource>,
    executor: Arc<JobExecutor>,
    requeue: Option<Arc<dyn JobSink>>,
    concurrency: usize,
    max_delayed_jobs: usize,
}

impl WorkerRunner {
    /// Create a runner consuming `source`.
    pub fn new(
        source: Arc<dyn JobSource>,
        executor: Arc<JobExecutor>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            source,
            executor,
            requeue: None,
            concurrency: config.concurrency.max(1),
            max_delayed_jobs: config.max_delayed_jobs.max(1),
        }
    }

    /// On shutdown, submit jobs that were dequeued but never started to
    /// `sink` instead of dropping them.
    pub fn with_requeue(mut self, sink: Arc<dyn JobSink>) -> Self {
        self.requeue = Some(sink);
        self
    }

    /// Run until the cancel signal is received.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            "Worker started with concurrency={}, max_delayed_jobs={}",
            self.concurrency,
            self.max_delayed_jobs
        );

        let (tx, mut rx) = mpsc::channel(HANDOFF_CAPACITY);
        let consumer = spawn_consumer(Arc::clone(&self.source), tx, cancel.clone());

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut delayed = DelayedJobs::new(self.max_delayed_jobs);
        let mut ready: VecDeque<Arc<dyn Job>> = VecDeque::new();

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Worker received shutdown signal");
                        break;
                    }
                }
                permit = Arc::clone(&semaphore).acquire_owned(), if !ready.is_empty() => {
                    let (Ok(permit), Some(job)) = (permit, ready.pop_front()) else {
                        break;
                    };
                    self.start(job, permit);
                }
                Some(job) = delayed.next_due(), if !delayed.is_empty() => {
                    tracing::debug!(job = job.name(), "Job delay elapsed");
                    ready.push_back(job);
                }
                received = rx.recv(), if ready.len() < HANDOFF_CAPACITY && !delayed.is_full() => {
                    let Some(job) = received else {
                        tracing::warn!("Job consumer stopped");
                        break;
                    };
                    let name = job.name();
                    let delay = job.delay();
                    if delay.is_zero() {
                        ready.push_back(job);
                    } else if delayed.insert(job, delay).is_err() {
                        tracing::error!(job = name, "Delay queue full, dropping job");
                    } else {
                        tracing::debug!(
                            job = name,
                            delay_ms = delay.as_millis() as u64,
                            waiting = delayed.len(),
                            "Job waiting for its delay"
                        );
                    }
                }
            }
        }

        rx.close();
        let mut unstarted: Vec<Arc<dyn Job>> = ready.into_iter().collect();
        while let Ok(job) = rx.try_recv() {
            unstarted.push(job);
        }
        match consumer.await {
            Ok(Some(job)) => unstarted.push(job),
            Ok(None) => {}
            Err(e) => tracing::error!("Job consumer task failed: {}", e),
        }
        unstarted.extend(delayed.drain());
        self.hand_back(unstarted).await;

        tracing::info!("Worker waiting for in-flight jobs to complete...");
        let drained = time::timeout(
            DRAIN_TIMEOUT,
            semaphore.acquire_many(self.concurrency as u32),
        )
        .await;
        if drained.is_err() {
            tracing::warn!("In-flight jobs did not finish within {:?}", DRAIN_TIMEOUT);
        }

        tracing::info!("Worker shut down complete");
    }

    fn start(&self, job: Arc<dyn Job>, permit: OwnedSemaphorePermit) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            let _permit = permit;
            // The executor logs the outcome; failed jobs are not retried.
            let _ = executor.execute(job.as_ref()).await;
        });
    }

    /// Return unstarted jobs to the requeue sink, or drop them with a count.
    async fn hand_back(&self, jobs: Vec<Arc<dyn Job>>) {
        if jobs.is_empty() {
            return;
        }
        let Some(sink) = &self.requeue else {
            tracing::warn!(
                dropped = jobs.len(),
                "Dropping jobs that were not started before shutdown"
            );
            return;
        };

        let total = jobs.len();
        let mut lost = 0;
        for job in jobs {
            let name = job.name();
            if let Err(e) = sink.enqueue(job).await {
                lost += 1;
                tracing::error!(job = name, error = %e, "Could not return job to the queue");
            }
        }
        tracing::info!(
            requeued = total - lost,
            lost,
            "Returned unstarted jobs to the queue"
        );
    }
}

/// Pull jobs from `source` into the hand-off channel.
///
/// A dequeue is never interrupted mid-flight; the cancel flag is checked
/// between dequeues, which are bounded by the source's own timeout. A job
/// dequeued after the runner stopped listening is returned from the task.
fn spawn_consumer(
    source: Arc<dyn JobSource>,
    tx: mpsc::Sender<Arc<dyn Job>>,
    mut cancel: watch::Receiver<bool>,
) -> JoinHandle<Option<Arc<dyn Job>>> {
    tokio::spawn(async move {
        while !*cancel.borrow() {
            match source.next().await {
                Ok(Some(job)) => {
                    if let Err(mpsc::error::SendError(job)) = tx.send(job).await {
                        tracing::debug!(job = job.name(), "Worker stopped, handing job back");
                        return Some(job);
                    }
                }
                Ok(None) => tracing::trace!("No jobs available"),
                Err(e @ JobExecutionError::Permanent(_)) => {
                    tracing::error!(error = %e, "Discarding job that cannot be decoded");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to dequeue job");
                    tokio::select! {
                        _ = cancel.changed() => {}
                        _ = time::sleep(DEQUEUE_BACKOFF) => {}
                    }
                }
            }
        }
        tracing::debug!("Job consumer stopped");
        None
    })
}
