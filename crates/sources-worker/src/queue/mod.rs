//! Job queue abstraction: where jobs are submitted and where the worker
//! takes them from.

pub mod memory;
#[cfg(feature = "redis-queue")]
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;

use sources_core::result::AppResult;

use crate::executor::JobExecutionError;
use crate::job::Job;

pub use memory::MemoryQueue;
#[cfg(feature = "redis-queue")]
pub use self::redis::RedisJobQueue;

/// Accepts submitted jobs.
#[async_trait]
pub trait JobSink: Send + Sync + std::fmt::Debug {
    /// Submit a job. Returns once the queue accepted it.
    async fn enqueue(&self, job: Arc<dyn Job>) -> AppResult<()>;

    /// Submit a job from inside a running job.
    ///
    /// Must not wait for room: the caller holds a worker slot, and the
    /// worker may need that slot back before it can drain the queue.
    async fn enqueue_follow_up(&self, job: Arc<dyn Job>) -> AppResult<()> {
        self.enqueue(job).await
    }
}

/// Hands out queued jobs in FIFO order.
#[async_trait]
pub trait JobSource: Send + Sync + std::fmt::Debug {
    /// Wait a bounded time for the next job.
    ///
    /// `Ok(None)` means nothing arrived in time. A [`JobExecutionError::Permanent`]
    /// reports one undecodable message that has already been removed.
    async fn next(&self) -> Result<Option<Arc<dyn Job>>, JobExecutionError>;

    /// Number of jobs waiting.
    async fn len(&self) -> AppResult<u64>;
}
