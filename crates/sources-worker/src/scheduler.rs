//! Periodic job scheduler.
//!
//! Each registered entry gets one task that sleeps for its interval, runs the
//! job in place, and starts over. Execution time is not subtracted, so the
//! cadence drifts by the job's duration.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use sources_core::config::RetryConfig;

use crate::executor::JobExecutor;
use crate::job::Job;
use crate::jobs::RetryCreateJob;

/// A job run every `interval`.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub interval: Duration,
    pub job: Arc<dyn Job>,
}

impl ScheduledJob {
    pub fn new(interval: Duration, job: Arc<dyn Job>) -> Self {
        Self { interval, job }
    }
}

/// Interval scheduler for periodic background jobs.
#[derive(Debug)]
pub struct Scheduler {
    executor: Arc<JobExecutor>,
    entries: Vec<ScheduledJob>,
}

impl Scheduler {
    /// Create a scheduler with no entries.
    pub fn new(executor: Arc<JobExecutor>) -> Self {
        Self {
            executor,
            entries: Vec::new(),
        }
    }

    /// Add an entry.
    pub fn register(&mut self, entry: ScheduledJob) {
        tracing::info!(
            "Registered: {} (every {}s)",
            entry.job.name(),
            entry.interval.as_secs()
        );
        self.entries.push(entry);
    }

    /// Register every default entry enabled in `retry`.
    pub fn register_default_jobs(&mut self, retry: &RetryConfig) {
        for entry in default_jobs(retry) {
            self.register(entry);
        }
    }

    /// Spawn one task per entry. Tasks end when `cancel` flips to `true`.
    pub fn start(&self, cancel: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        tracing::info!("Scheduler started with {} job(s)", self.entries.len());
        self.entries
            .iter()
            .cloned()
            .map(|entry| {
                let executor = Arc::clone(&self.executor);
                tokio::spawn(run_periodically(executor, entry, cancel.clone()))
            })
            .collect()
    }
}

/// Entries the worker schedules out of the box.
pub fn default_jobs(retry: &RetryConfig) -> Vec<ScheduledJob> {
    let mut entries = Vec::new();
    if retry.enabled {
        entries.push(ScheduledJob::new(
            Duration::from_secs(retry.interval_seconds),
            Arc::new(RetryCreateJob),
        ));
    }
    entries
}

async fn run_periodically(
    executor: Arc<JobExecutor>,
    entry: ScheduledJob,
    mut cancel: watch::Receiver<bool>,
) {
    let name = entry.job.name();
    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(entry.interval) => {
                tracing::debug!(job = name, "Running scheduled job");
                // Outcome already logged by the executor.
                let _ = executor.run_now(Arc::clone(&entry.job)).await;
            }
        }
    }
    tracing::info!(job = name, "Scheduled job stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingJob, context};

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_interval_until_cancelled() {
        let (ctx, _) = context().await;
        let mut scheduler = Scheduler::new(Arc::new(JobExecutor::new(ctx)));
        let job = RecordingJob::new(Duration::ZERO);
        let runs = job.runs();
        scheduler.register(ScheduledJob::new(Duration::from_secs(120), Arc::new(job)));

        let (cancel, cancel_rx) = watch::channel(false);
        let handles = scheduler.start(cancel_rx);

        tokio::time::sleep(Duration::from_secs(119)).await;
        assert_eq!(runs.count(), 0);

        tokio::time::sleep(Duration::from_secs(242)).await;
        assert_eq!(runs.count(), 3);

        cancel.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(runs.count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_keeps_its_schedule() {
        let (ctx, _) = context().await;
        let mut scheduler = Scheduler::new(Arc::new(JobExecutor::new(ctx)));
        let job = RecordingJob::failing();
        let runs = job.runs();
        scheduler.register(ScheduledJob::new(Duration::from_secs(10), Arc::new(job)));

        let (cancel, cancel_rx) = watch::channel(false);
        let handles = scheduler.start(cancel_rx);

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(runs.count(), 3);

        cancel.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[test]
    fn test_default_jobs_follow_retry_config() {
        let retry = RetryConfig::default();
        let entries = default_jobs(&retry);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].job.name(), RetryCreateJob::NAME);
        assert_eq!(entries[0].interval, Duration::from_secs(120));

        let disabled = RetryConfig {
            enabled: false,
            ..RetryConfig::default()
        };
        assert!(default_jobs(&disabled).is_empty());
    }
}
