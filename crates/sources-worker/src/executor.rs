//! Job executor: runs jobs against the shared [`JobContext`] and logs the
//! outcome.

use std::sync::Arc;

use serde_json::Value;

use sources_core::error::AppError;

use crate::job::{Job, JobContext};

/// Error from job execution.
///
/// Failed jobs are logged and dropped; the variant only decides how loudly.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The job can never succeed as submitted (unknown name, unknown
    /// resource kind, malformed payload).
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// An external dependency failed; a later submission may succeed.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// A store or infrastructure failure.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),

    /// Several independent steps of one job failed.
    #[error("{} step(s) failed: {}", .0.len(), describe(.0))]
    Aggregate(Vec<JobExecutionError>),
}

impl JobExecutionError {
    /// Whether resubmitting the same job could never help.
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Permanent(_) => true,
            Self::Aggregate(errors) => errors.iter().all(Self::is_permanent),
            Self::Transient(_) | Self::Internal(_) => false,
        }
    }
}

fn describe(errors: &[JobExecutionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Runs jobs with the collaborators they need.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    ctx: JobContext,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }

    /// Run a job immediately and log its outcome.
    pub async fn execute(&self, job: &dyn Job) -> Result<(), JobExecutionError> {
        let name = job.name();
        let args = Value::Object(job.arguments());
        tracing::info!(job = name, arguments = %args, "Running job");

        let result = job.run(&self.ctx).await;
        match &result {
            Ok(()) => tracing::info!(job = name, arguments = %args, "Job finished"),
            Err(e @ JobExecutionError::Transient(_)) => {
                tracing::warn!(job = name, arguments = %args, error = %e, "Job failed")
            }
            Err(e) => tracing::error!(job = name, arguments = %args, error = %e, "Job failed"),
        }
        result
    }

    /// Wait for the job's delay, then run it in the current task.
    ///
    /// Used by the scheduler and the CLI; bypasses every queue.
    pub async fn run_now(&self, job: Arc<dyn Job>) -> Result<(), JobExecutionError> {
        let delay = job.delay();
        if !delay.is_zero() {
            tracing::debug!(
                job = job.name(),
                delay_ms = delay.as_millis() as u64,
                "Waiting before run"
            );
            tokio::time::sleep(delay).await;
        }
        self.execute(job.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{RecordingJob, context};

    #[test]
    fn test_aggregate_lists_every_failure() {
        let err = JobExecutionError::Aggregate(vec![
            JobExecutionError::Transient("app 1".into()),
            JobExecutionError::Transient("app 2".into()),
        ]);
        let text = err.to_string();
        assert!(text.starts_with("2 step(s) failed"));
        assert!(text.contains("app 1") && text.contains("app 2"));
        assert!(!err.is_permanent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_now_waits_for_delay() {
        let (ctx, _) = context().await;
        let executor = JobExecutor::new(ctx);
        let job = RecordingJob::new(Duration::from_secs(15));
        let runs = job.runs();

        let started = tokio::time::Instant::now();
        executor.run_now(Arc::new(job)).await.unwrap();

        assert_eq!(runs.count(), 1);
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_execute_returns_job_error() {
        let (ctx, _) = context().await;
        let executor = JobExecutor::new(ctx);
        let job = RecordingJob::failing();

        let err = executor.execute(&job).await.unwrap_err();
        assert!(matches!(err, JobExecutionError::Transient(_)));
    }
}
