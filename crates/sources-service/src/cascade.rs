//! Cascading deletion of sources and applications.
//!
//! The rows go in one store transaction. Destroy events and the removal of
//! the orphaned authentications follow, and their failures are only logged:
//! the resource is already gone and a dangling authentication is harmless.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use sources_core::result::AppResult;
use sources_core::traits::events::raise;
use sources_core::traits::{EventSender, ResourceDeleter};
use sources_core::types::{ForwardableHeader, ResourceKind, ResourceRef};
use sources_database::{AuthenticationStore, CascadeStore};

/// Deletes resources through the [`CascadeStore`] and announces every
/// deleted row.
#[derive(Debug, Clone)]
pub struct CascadeDeleter {
    cascades: Arc<dyn CascadeStore>,
    authentications: Arc<dyn AuthenticationStore>,
    events: Arc<dyn EventSender>,
}

impl CascadeDeleter {
    /// Create a new deleter.
    pub fn new(
        cascades: Arc<dyn CascadeStore>,
        authentications: Arc<dyn AuthenticationStore>,
        events: Arc<dyn EventSender>,
    ) -> Self {
        Self {
            cascades,
            authentications,
            events,
        }
    }

    async fn announce<T: Serialize + Sync>(
        &self,
        event_type: &str,
        rows: &[T],
        headers: &[ForwardableHeader],
    ) {
        for row in rows {
            if let Err(e) = raise(self.events.as_ref(), event_type, row, headers).await {
                error!(event_type, error = %e, "Could not raise destroy event");
            }
        }
    }

    /// Collect the authentications owned by each `(model, ids)` group, delete
    /// them in one batch and announce the deletions.
    async fn delete_authentications(
        &self,
        tenant_id: i64,
        owners: &[(&str, Vec<i64>)],
        headers: &[ForwardableHeader],
    ) {
        let mut ids = Vec::new();
        for (resource_type, resource_ids) in owners {
            match self
                .authentications
                .list_ids_for_resources(tenant_id, resource_type, resource_ids)
                .await
            {
                Ok(found) => ids.extend(found),
                Err(e) => error!(
                    resource_type,
                    ?resource_ids,
                    error = %e,
                    "Could not fetch authentications"
                ),
            }
        }
        if ids.is_empty() {
            return;
        }

        match self.authentications.bulk_delete(tenant_id, &ids).await {
            Ok(deleted) => {
                self.announce("Authentication.destroy", &deleted, headers)
                    .await
            }
            Err(e) => error!(?ids, error = %e, "Could not delete authentications"),
        }
    }
}

#[async_trait]
impl ResourceDeleter for CascadeDeleter {
    async fn delete_cascade(
        &self,
        resource: &ResourceRef,
        headers: &[ForwardableHeader],
    ) -> AppResult<()> {
        let tenant_id = resource.tenant_id;

        match resource.kind {
            ResourceKind::Source => {
                let deleted = self
                    .cascades
                    .delete_source_cascade(tenant_id, resource.id)
                    .await?;

                self.announce(
                    "ApplicationAuthentication.destroy",
                    &deleted.application_authentications,
                    headers,
                )
                .await;
                self.announce("Application.destroy", &deleted.applications, headers)
                    .await;
                self.announce("Endpoint.destroy", &deleted.endpoints, headers)
                    .await;
                self.announce("RhcConnection.destroy", &deleted.rhc_connections, headers)
                    .await;
                self.announce(
                    "Source.destroy",
                    std::slice::from_ref(&deleted.source),
                    headers,
                )
                .await;

                let owners = [
                    (
                        "Application",
                        deleted.applications.iter().map(|a| a.id).collect(),
                    ),
                    ("Endpoint", deleted.endpoints.iter().map(|e| e.id).collect()),
                    ("Source", vec![resource.id]),
                ];
                self.delete_authentications(tenant_id, &owners, headers)
                    .await;

                info!(
                    %resource,
                    applications = deleted.applications.len(),
                    endpoints = deleted.endpoints.len(),
                    rhc_connections = deleted.rhc_connections.len(),
                    "Source deleted"
                );
            }
            ResourceKind::Application => {
                let deleted = self
                    .cascades
                    .delete_application_cascade(tenant_id, resource.id)
                    .await?;

                self.announce(
                    "ApplicationAuthentication.destroy",
                    &deleted.application_authentications,
                    headers,
                )
                .await;
                self.announce(
                    "Application.destroy",
                    std::slice::from_ref(&deleted.application),
                    headers,
                )
                .await;

                let owners = [("Application", vec![resource.id])];
                self.delete_authentications(tenant_id, &owners, headers)
                    .await;

                info!(%resource, "Application deleted");
            }
        }

        Ok(())
    }
}
