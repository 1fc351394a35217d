//! Delayed cascading deletion of a source or an application.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use sources_core::result::AppResult;
use sources_core::types::{ForwardableHeader, ResourceKind, ResourceRef};

use crate::executor::JobExecutionError;
use crate::job::{Job, JobContext};

/// Delete a resource and its dependants after waiting `wait_seconds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncDestroyJob {
    /// Headers forwarded with every destroy event.
    #[serde(default)]
    pub headers: Vec<ForwardableHeader>,
    /// Owning tenant.
    pub tenant: i64,
    /// Seconds to wait after dequeue.
    pub wait_seconds: u64,
    /// `"source"` or `"application"`, case-insensitive.
    pub model: String,
    /// Resource id.
    pub id: i64,
}

impl AsyncDestroyJob {
    /// Registry name.
    pub const NAME: &'static str = "AsyncDestroyJob";

    /// Create a job deleting `kind`/`id` after `wait_seconds`.
    pub fn new(
        tenant: i64,
        kind: ResourceKind,
        id: i64,
        wait_seconds: u64,
        headers: Vec<ForwardableHeader>,
    ) -> Self {
        Self {
            headers,
            tenant,
            wait_seconds,
            model: kind.as_str().to_string(),
            id,
        }
    }

    /// Rebuild the job from its payload.
    pub fn from_payload(payload: &[u8]) -> AppResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[async_trait]
impl Job for AsyncDestroyJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn delay(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }

    fn arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("wait_seconds".into(), json!(self.wait_seconds));
        args.insert("model".into(), json!(self.model));
        args.insert("id".into(), json!(self.id));
        args
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobExecutionError> {
        let kind: ResourceKind = self.model.parse().map_err(|_| {
            JobExecutionError::Permanent(format!(
                "invalid model for async destroy job: {}",
                self.model
            ))
        })?;

        let resource = ResourceRef {
            tenant_id: self.tenant,
            kind,
            id: self.id,
        };
        match ctx.deleter.delete_cascade(&resource, &self.headers).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Err(JobExecutionError::Permanent(format!(
                "{kind} {} is already gone: {e}",
                self.id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn to_payload(&self) -> AppResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
