//! Periodic reconciliation re-announcing applications whose creation never
//! completed downstream.
//!
//! One tick pins the counter of applications that became available, selects
//! the recent non-available ones still under the retry ceiling, bumps their
//! counters, and commits. Only after the commit are the create events raised
//! again, so a rolled back tick never leaks notifications.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use sources_core::config::RetryConfig;
use sources_core::result::AppResult;
use sources_core::traits::events::raise;
use sources_database::RetryTransaction;
use sources_entity::RetryCandidate;

use crate::executor::JobExecutionError;
use crate::job::{Job, JobContext};

/// Scheduled reconciliation sweep. Never dispatched through the durable
/// queue, so its payload is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryCreateJob;

impl RetryCreateJob {
    /// Name used in logs.
    pub const NAME: &'static str = "RetryCreateJob";

    /// Steps run inside the transaction. Returns the candidates to resend.
    async fn sweep(
        tx: &mut dyn RetryTransaction,
        config: &RetryConfig,
    ) -> AppResult<Vec<RetryCandidate>> {
        let pinned = tx.pin_available(config.retry_max).await?;
        info!(
            pinned,
            "Updated applications that became available since the last run"
        );

        let created_after = Utc::now() - chrono::Duration::minutes(config.record_age_limit_minutes);
        let candidates = tx
            .find_retry_candidates(created_after, config.retry_max)
            .await?;
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();
        tx.increment_retry_counters(&ids).await?;
        Ok(candidates)
    }
}

/// Raise the create events of one candidate again. Every failure is logged
/// and ends the candidate's resend.
async fn resend_create_events(ctx: &JobContext, candidate: RetryCandidate) {
    let application_id = candidate.id;

    match ctx
        .applications
        .application_opted_into_retry(candidate.application_type_id)
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            debug!(application_id, "Application type not opted into retrying");
            return;
        }
        Err(e) => {
            warn!(
                application_id,
                application_type_id = candidate.application_type_id,
                error = %e,
                "Failed to check retry opt-in"
            );
            return;
        }
    }

    let loaded = match ctx
        .applications
        .find_with_relations(candidate.tenant_id, application_id)
        .await
    {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!(application_id, error = %e, "Failed to load application");
            return;
        }
    };

    let authentications = match ctx
        .authentications
        .list_for_application(candidate.tenant_id, application_id)
        .await
    {
        Ok(authentications) => authentications,
        Err(e) => {
            warn!(application_id, error = %e, "Failed to list authentications");
            return;
        }
    };

    let headers = loaded.tenant.forwardable_headers();
    let events = ctx.events.as_ref();

    if let Err(e) = raise(events, "Source.create", &loaded.source, &headers).await {
        warn!(source_id = loaded.source.id, error = %e, "Failed to raise Source.create");
    }
    if let Err(e) = raise(events, "Application.create", &loaded.application, &headers).await {
        warn!(application_id, error = %e, "Failed to raise Application.create");
    }
    for authentication in &authentications {
        if let Err(e) = raise(events, "Authentication.create", authentication, &headers).await {
            warn!(
                authentication_id = authentication.id,
                error = %e,
                "Failed to raise Authentication.create"
            );
        }
    }
    for link in &loaded.application_authentications {
        if let Err(e) = raise(events, "ApplicationAuthentication.create", link, &headers).await {
            warn!(
                application_authentication_id = link.id,
                error = %e,
                "Failed to raise ApplicationAuthentication.create"
            );
        }
    }
}

#[async_trait]
impl Job for RetryCreateJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn delay(&self) -> Duration {
        Duration::ZERO
    }

    fn arguments(&self) -> Map<String, Value> {
        Map::new()
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), JobExecutionError> {
        let mut tx = ctx.applications.begin_retry().await?;

        let candidates = match Self::sweep(tx.as_mut(), &ctx.retry).await {
            Ok(candidates) => candidates,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Failed to roll back reconciliation");
                }
                return Err(e.into());
            }
        };
        tx.commit().await?;

        if candidates.is_empty() {
            info!("No retryable applications found");
            return Ok(());
        }
        info!(count = candidates.len(), "Resending create events");

        futures::stream::iter(candidates)
            .for_each_concurrent(ctx.retry.resend_concurrency.max(1), |candidate| {
                resend_create_events(ctx, candidate)
            })
            .await;

        Ok(())
    }

    fn to_payload(&self) -> AppResult<Vec<u8>> {
        Ok(b"{}".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fakes, context};
    use sources_database::memory::fixtures;
    use sources_entity::Application;

    async fn seed(fakes: &Fakes) {
        fakes.store.insert_tenant(fixtures::tenant(1)).await;
        fakes.store.insert_source(fixtures::source(10, 1)).await;
        fakes.store.opt_into_retry(1).await;
    }

    fn app(id: i64, age_minutes: i64, status: Option<&str>, counter: i32) -> Application {
        let mut app = fixtures::application(id, 1, 10, age_minutes);
        app.availability_status = status.map(str::to_string);
        app.retry_counter = counter;
        app
    }

    async fn counter(fakes: &Fakes, id: i64) -> i32 {
        fakes.store.application(id).await.map(|a| a.retry_counter).unwrap_or(-1)
    }

    #[tokio::test]
    async fn test_reconciliation_scenario() {
        let (ctx, fakes) = context().await;
        seed(&fakes).await;
        fakes.store.insert_application(app(1, 5, Some("unavailable"), 2)).await;
        fakes.store.insert_application(app(2, 5, Some("available"), 1)).await;
        fakes.store.insert_application(app(3, 40, Some("unavailable"), 0)).await;

        RetryCreateJob.run(&ctx).await.unwrap();

        assert_eq!(counter(&fakes, 1).await, 3);
        assert_eq!(counter(&fakes, 2).await, 5);
        assert_eq!(counter(&fakes, 3).await, 0);

        let applications: Vec<i64> = fakes
            .events
            .events()
            .await
            .iter()
            .filter(|e| e.event_type == "Application.create")
            .map(|e| e.payload["id"].as_i64().unwrap_or_default())
            .collect();
        assert_eq!(applications, vec![1]);
    }

    #[tokio::test]
    async fn test_counter_never_exceeds_ceiling() {
        let (ctx, fakes) = context().await;
        seed(&fakes).await;
        fakes.store.insert_application(app(1, 1, None, 4)).await;

        for _ in 0..3 {
            RetryCreateJob.run(&ctx).await.unwrap();
        }

        assert_eq!(counter(&fakes, 1).await, 5);
        assert_eq!(fakes.events.count("Application.create").await, 1);
    }

    #[tokio::test]
    async fn test_empty_status_counts_as_not_available() {
        let (ctx, fakes) = context().await;
        seed(&fakes).await;
        fakes.store.insert_application(app(1, 1, Some(""), 0)).await;

        RetryCreateJob.run(&ctx).await.unwrap();

        assert_eq!(counter(&fakes, 1).await, 1);
    }

    #[tokio::test]
    async fn test_resend_raises_every_create_event_with_tenant_headers() {
        let (ctx, fakes) = context().await;
        seed(&fakes).await;
        fakes.store.insert_application(app(1, 1, None, 0)).await;
        fakes
            .store
            .insert_authentication(fixtures::authentication(7, 1, "Application", 1))
            .await;
        fakes
            .store
            .insert_application_authentication(fixtures::application_authentication(70, 1, 1, 7))
            .await;

        RetryCreateJob.run(&ctx).await.unwrap();

        assert_eq!(
            fakes.events.event_types().await,
            vec![
                "Source.create",
                "Application.create",
                "Authentication.create",
                "ApplicationAuthentication.create",
            ]
        );
        let events = fakes.events.events().await;
        let org = sources_core::types::headers::find(&events[0].headers, "x-rh-sources-org-id");
        assert_eq!(org, Some("org1"));
    }

    #[tokio::test]
    async fn test_not_opted_in_is_counted_but_not_resent() {
        let (ctx, fakes) = context().await;
        fakes.store.insert_tenant(fixtures::tenant(1)).await;
        fakes.store.insert_source(fixtures::source(10, 1)).await;
        fakes.store.insert_application(app(1, 1, None, 0)).await;

        RetryCreateJob.run(&ctx).await.unwrap();

        assert_eq!(counter(&fakes, 1).await, 1);
        assert!(fakes.events.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_opt_in_lookup_failure_skips_candidate() {
        let (ctx, fakes) = context().await;
        seed(&fakes).await;
        fakes.store.fail_opt_in_lookup(1).await;
        fakes.store.insert_application(app(1, 1, None, 0)).await;

        RetryCreateJob.run(&ctx).await.unwrap();

        assert!(fakes.events.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_skips_only_that_candidate() {
        let (ctx, fakes) = context().await;
        seed(&fakes).await;
        fakes.store.insert_application(app(1, 1, None, 0)).await;
        fakes.store.insert_application(app(2, 1, None, 0)).await;
        fakes.store.fail_find_with_relations(1).await;

        RetryCreateJob.run(&ctx).await.unwrap();

        assert_eq!(fakes.events.count("Application.create").await, 1);
    }

    #[tokio::test]
    async fn test_failed_commit_sends_nothing() {
        let (ctx, fakes) = context().await;
        seed(&fakes).await;
        fakes.store.insert_application(app(1, 1, None, 0)).await;
        fakes.store.fail_next_commit().await;

        let err = RetryCreateJob.run(&ctx).await.unwrap_err();

        assert!(matches!(err, JobExecutionError::Internal(_)));
        assert_eq!(counter(&fakes, 1).await, 0);
        assert!(fakes.events.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_event_failures_do_not_fail_tick() {
        let (ctx, fakes) = context().await;
        seed(&fakes).await;
        fakes.store.insert_application(app(1, 1, None, 0)).await;
        fakes.events.fail_on("Source.create").await;

        RetryCreateJob.run(&ctx).await.unwrap();

        assert_eq!(fakes.events.count("Application.create").await, 1);
    }

    #[test]
    fn test_payload_is_empty_object() {
        assert_eq!(RetryCreateJob.to_payload().unwrap(), b"{}".to_vec());
        assert!(RetryCreateJob.arguments().is_empty());
    }
}
