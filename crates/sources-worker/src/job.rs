//! The job abstraction and the collaborators handed to every job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use sources_core::config::RetryConfig;
use sources_core::result::AppResult;
use sources_core::traits::{EventSender, ProvisioningClient, ResourceDeleter};
use sources_database::{ApplicationStore, AuthenticationStore};

use crate::executor::JobExecutionError;
use crate::queue::JobSink;

/// A unit of background work.
///
/// Every variant can rebuild itself from [`to_payload`](Job::to_payload)
/// through the factory registered under [`name`](Job::name) in the
/// [`JobRegistry`](crate::envelope::JobRegistry).
#[async_trait]
pub trait Job: Send + Sync + std::fmt::Debug {
    /// Stable discriminator used on the wire.
    fn name(&self) -> &'static str;

    /// How long the job waits after being dequeued before it runs.
    fn delay(&self) -> Duration;

    /// Key/value summary for logs.
    fn arguments(&self) -> Map<String, Value>;

    /// Execute the job.
    async fn run(&self, ctx: &JobContext) -> Result<(), JobExecutionError>;

    /// Serialize the job's own fields as JSON bytes.
    fn to_payload(&self) -> AppResult<Vec<u8>>;
}

/// Collaborators available to a running job.
///
/// Built once at startup and cloned into the executor; jobs never reach for
/// process-wide singletons.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Application reads and the reconciliation transaction.
    pub applications: Arc<dyn ApplicationStore>,
    /// Authentication reads.
    pub authentications: Arc<dyn AuthenticationStore>,
    /// Event stream.
    pub events: Arc<dyn EventSender>,
    /// Provisioning backend.
    pub provisioning: Arc<dyn ProvisioningClient>,
    /// Cascading resource deletion.
    pub deleter: Arc<dyn ResourceDeleter>,
    /// Queue follow-up jobs are submitted to.
    pub queue: Arc<dyn JobSink>,
    /// Reconciliation settings.
    pub retry: RetryConfig,
}
