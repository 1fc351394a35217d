//! Phase one of the Superkey teardown: ask the provisioning backend to
//! unwind a resource's cloud side effects, then schedule the local deletion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use sources_core::result::AppResult;
use sources_core::types::{ForwardableHeader, ResourceKind, ResourceRef};

use super::async_destroy::AsyncDestroyJob;
use crate::executor::JobExecutionError;
use crate::job::{Job, JobContext};

/// Seconds the local deletion waits for the backend to finish unwinding.
pub const DESTROY_GRACE_SECONDS: u64 = 15;

/// Tear down a Superkey-managed source or application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperkeyDestroyJob {
    /// Headers forwarded to the backend and the follow-up job.
    #[serde(default)]
    pub headers: Vec<ForwardableHeader>,
    /// Identity sent to the provisioning backend.
    pub identity: String,
    /// Owning tenant.
    pub tenant: i64,
    /// `"source"` or `"application"`, case-insensitive.
    pub model: String,
    /// Resource id.
    pub id: i64,
}

impl SuperkeyDestroyJob {
    /// Registry name.
    pub const NAME: &'static str = "SuperkeyDestroyJob";

    /// Create a teardown job for `kind`/`id`.
    pub fn new(
        tenant: i64,
        kind: ResourceKind,
        id: i64,
        identity: impl Into<String>,
        headers: Vec<ForwardableHeader>,
    ) -> Self {
        Self {
            headers,
            identity: identity.into(),
            tenant,
            model: kind.as_str().to_string(),
            id,
        }
    }

    /// Rebuild the job from its payload.
    pub fn from_payload(payload: &[u8]) -> AppResult<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    async fn send_for_application(
        &self,
        ctx: &JobContext,
        application_id: i64,
    ) -> Result<(), JobExecutionError> {
        info!(application_id, tenant = self.tenant, "Sending teardown request for application");

        let resource = ResourceRef::application(self.tenant, application_id);
        ctx.provisioning
            .send_delete_request(&self.identity, &resource, &self.headers)
            .await
            .map_err(|e| {
                JobExecutionError::Transient(format!(
                    "teardown request for application {application_id} failed: {e}"
                ))
            })?;

        self.schedule_destroy(ctx, ResourceKind::Application, application_id)
            .await
    }

    async fn send_for_source(
        &self,
        ctx: &JobContext,
        source_id: i64,
    ) -> Result<(), JobExecutionError> {
        info!(source_id, tenant = self.tenant, "Sending teardown requests for source");

        let applications = ctx
            .applications
            .list_for_source(self.tenant, source_id)
            .await?;

        let mut errors = Vec::new();
        for application in &applications {
            if let Err(e) = self.send_for_application(ctx, application.id).await {
                warn!(application_id = application.id, error = %e, "Teardown failed for application");
                errors.push(e);
            }
        }

        if let Err(e) = self
            .schedule_destroy(ctx, ResourceKind::Source, source_id)
            .await
        {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(JobExecutionError::Aggregate(errors))
        }
    }

    async fn schedule_destroy(
        &self,
        ctx: &JobContext,
        kind: ResourceKind,
        id: i64,
    ) -> Result<(), JobExecutionError> {
        let job = AsyncDestroyJob::new(
            self.tenant,
            kind,
            id,
            DESTROY_GRACE_SECONDS,
            self.headers.clone(),
        );
        ctx.queue.enqueue_follow_up(Arc::new(job)).await.map_err(|e| {
            JobExecutionError::Transient(format!("could not schedule deletion of {kind} {id}: {e}"))
        })
    }
}

#[async_trait]
impl Job for SuperkeyDestroyJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn delay(&self) -> Duration {
        Duration::ZERO
    }

    fn arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("model".into(), json!(self.model));
        args.insert("id".into(), json!(self.id));
        args
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobExecutionError> {
        let kind: ResourceKind = self.model.parse().map_err(|_| {
            JobExecutionError::Permanent(format!("unsupported model for superkey: {}", self.model))
        })?;

        match kind {
            ResourceKind::Source => self.send_for_source(ctx, self.id).await,
            ResourceKind::Application => self.send_for_application(ctx, self.id).await,
        }
    }

    fn to_payload(&self) -> AppResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fakes, context};
    use sources_database::memory::fixtures;

    async fn seed_source(fakes: &Fakes, application_ids: &[i64]) {
        fakes.store.insert_tenant(fixtures::tenant(1)).await;
        fakes.store.insert_source(fixtures::source(10, 1)).await;
        for id in application_ids {
            fakes
                .store
                .insert_application(fixtures::application(*id, 1, 10, 1))
                .await;
        }
    }

    async fn queued_destroys(fakes: &Fakes) -> Vec<AsyncDestroyJob> {
        fakes
            .queue
            .drain()
            .await
            .into_iter()
            .map(|job| AsyncDestroyJob::from_payload(&job.to_payload().unwrap()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_application_success_schedules_one_destroy() {
        let (ctx, fakes) = context().await;
        let job = SuperkeyDestroyJob::new(1, ResourceKind::Application, 100, "id", vec![]);

        job.run(&ctx).await.unwrap();

        let queued = queued_destroys(&fakes).await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].model, "application");
        assert_eq!(queued[0].id, 100);
        assert_eq!(queued[0].wait_seconds, 15);
        assert_eq!(fakes.provisioning.calls(), vec![ResourceRef::application(1, 100)]);
    }

    #[tokio::test]
    async fn test_application_failure_schedules_nothing() {
        let (ctx, fakes) = context().await;
        fakes.provisioning.fail_for(100);
        let job = SuperkeyDestroyJob::new(1, ResourceKind::Application, 100, "id", vec![]);

        let err = job.run(&ctx).await.unwrap_err();

        assert!(matches!(err, JobExecutionError::Transient(_)));
        assert!(queued_destroys(&fakes).await.is_empty());
    }

    #[tokio::test]
    async fn test_source_partial_failure_aggregates_and_still_schedules_source() {
        let (ctx, fakes) = context().await;
        seed_source(&fakes, &[100, 101, 102]).await;
        fakes.provisioning.fail_for(101);
        fakes.provisioning.fail_for(102);
        let job = SuperkeyDestroyJob::new(1, ResourceKind::Source, 10, "id", vec![]);

        let err = job.run(&ctx).await.unwrap_err();

        match err {
            JobExecutionError::Aggregate(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregate error, got {other:?}"),
        }
        let queued = queued_destroys(&fakes).await;
        let sources: Vec<_> = queued.iter().filter(|j| j.model == "source").collect();
        let applications: Vec<_> = queued.iter().filter(|j| j.model == "application").collect();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, 10);
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].id, 100);
    }

    #[tokio::test]
    async fn test_source_success_schedules_every_application_then_source() {
        let (ctx, fakes) = context().await;
        seed_source(&fakes, &[100, 101]).await;
        let job = SuperkeyDestroyJob::new(1, ResourceKind::Source, 10, "id", vec![]);

        job.run(&ctx).await.unwrap();

        let order: Vec<(String, i64)> = queued_destroys(&fakes)
            .await
            .into_iter()
            .map(|j| (j.model, j.id))
            .collect();
        assert_eq!(
            order,
            vec![
                ("application".to_string(), 100),
                ("application".to_string(), 101),
                ("source".to_string(), 10),
            ]
        );
    }

    #[tokio::test]
    async fn test_source_listing_failure_schedules_nothing() {
        let (ctx, fakes) = context().await;
        seed_source(&fakes, &[100]).await;
        fakes.store.fail_list_for_source().await;
        let job = SuperkeyDestroyJob::new(1, ResourceKind::Source, 10, "id", vec![]);

        let err = job.run(&ctx).await.unwrap_err();

        assert!(matches!(err, JobExecutionError::Internal(_)));
        assert!(queued_destroys(&fakes).await.is_empty());
        assert!(fakes.provisioning.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_model_is_permanent() {
        let (ctx, fakes) = context().await;
        let mut job = SuperkeyDestroyJob::new(1, ResourceKind::Source, 10, "id", vec![]);
        job.model = "endpoint".to_string();

        let err = job.run(&ctx).await.unwrap_err();

        assert!(matches!(err, JobExecutionError::Permanent(_)));
        assert!(fakes.provisioning.calls().is_empty());
    }
}
