//! Durable job queue on a Redis list.
//!
//! Producers `RPUSH` encoded [`DispatchEnvelope`]s, the worker `BLPOP`s them.
//! Every process pointing at the same list shares the queue.

use std::sync::Arc;

use async_trait::async_trait;

use sources_cache::RedisClient;
use sources_core::result::AppResult;

use super::{JobSink, JobSource};
use crate::envelope::{DispatchEnvelope, JobRegistry};
use crate::executor::JobExecutionError;
use crate::job::Job;

/// Job queue backed by a Redis list.
#[derive(Debug, Clone)]
pub struct RedisJobQueue {
    client: RedisClient,
    list: String,
    registry: Arc<JobRegistry>,
}

impl RedisJobQueue {
    /// Create a queue on `list`, decoding jobs with `registry`.
    pub fn new(client: RedisClient, list: impl Into<String>, registry: Arc<JobRegistry>) -> Self {
        Self {
            client,
            list: list.into(),
            registry,
        }
    }

    /// Name of the Redis list.
    pub fn list(&self) -> &str {
        &self.list
    }
}

#[async_trait]
impl JobSink for RedisJobQueue {
    async fn enqueue(&self, job: Arc<dyn Job>) -> AppResult<()> {
        let bytes = DispatchEnvelope::wrap(job.as_ref())?.encode()?;
        let length = self.client.push_back(&self.list, &bytes).await?;
        tracing::info!(
            job = job.name(),
            queue = %self.list,
            length,
            "Job submitted"
        );
        Ok(())
    }
}

#[async_trait]
impl JobSource for RedisJobQueue {
    async fn next(&self) -> Result<Option<Arc<dyn Job>>, JobExecutionError> {
        let Some(bytes) = self.client.pop_front_blocking(&self.list).await? else {
            return Ok(None);
        };
        let job = self.registry.decode_bytes(&bytes)?;
        tracing::debug!(job = job.name(), queue = %self.list, "Job dequeued");
        Ok(Some(job))
    }

    async fn len(&self) -> AppResult<u64> {
        self.client.list_len(&self.list).await
    }
}
