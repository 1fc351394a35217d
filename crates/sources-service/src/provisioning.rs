//! HTTP client for the Superkey provisioning backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use sources_core::config::SuperkeyConfig;
use sources_core::error::{AppError, ErrorKind};
use sources_core::result::AppResult;
use sources_core::traits::ProvisioningClient;
use sources_core::types::headers::IDENTITY_HEADER;
use sources_core::types::{ForwardableHeader, ResourceKind, ResourceRef};
use sources_database::ApplicationStore;
use sources_entity::application::SuperkeyData;

/// Path of the teardown endpoint, relative to the configured base URL.
pub const DESTROY_PATH: &str = "/api/superkey/v1/destroy";

/// Body of a teardown request.
#[derive(Debug, Clone, Serialize)]
struct DestroyRequest<'a> {
    tenant_id: i64,
    application_id: i64,
    guid: &'a str,
    provider: &'a str,
    steps_completed: &'a HashMap<String, HashMap<String, String>>,
}

/// Sends teardown requests for Superkey-provisioned applications.
#[derive(Debug, Clone)]
pub struct HttpProvisioningClient {
    http: reqwest::Client,
    destroy_url: String,
    applications: Arc<dyn ApplicationStore>,
}

impl HttpProvisioningClient {
    /// Create a client for the backend described by `config`.
    pub fn new(
        config: &SuperkeyConfig,
        applications: Arc<dyn ApplicationStore>,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            http,
            destroy_url: format!("{}{DESTROY_PATH}", config.url.trim_end_matches('/')),
            applications,
        })
    }
}

#[async_trait]
impl ProvisioningClient for HttpProvisioningClient {
    async fn send_delete_request(
        &self,
        identity: &str,
        resource: &ResourceRef,
        headers: &[ForwardableHeader],
    ) -> AppResult<()> {
        if resource.kind != ResourceKind::Application {
            return Err(AppError::validation(format!(
                "teardown requests target applications, got {resource}"
            )));
        }

        let loaded = self
            .applications
            .find_with_relations(resource.tenant_id, resource.id)
            .await?;
        let Some(data) = SuperkeyData::parse(loaded.application.superkey_data.as_ref())? else {
            info!(%resource, "Application was never provisioned, nothing to tear down");
            return Ok(());
        };

        let body = DestroyRequest {
            tenant_id: resource.tenant_id,
            application_id: resource.id,
            guid: &data.guid,
            provider: &data.provider,
            steps_completed: &data.steps_completed,
        };

        let mut request = self.http.post(&self.destroy_url).json(&body);
        for header in headers
            .iter()
            .filter(|h| !h.key.eq_ignore_ascii_case(IDENTITY_HEADER))
        {
            request = request.header(header.key.as_str(), header.value.as_str());
        }
        request = request.header(IDENTITY_HEADER, identity);

        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::ExternalService,
                format!("Teardown request for {resource} failed: {e}"),
                e,
            )
        })?;

        let status = response.status();
        if status.is_success() {
            info!(%resource, guid = %data.guid, "Teardown request accepted");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        warn!(%resource, status = status.as_u16(), body = %text, "Teardown request rejected");
        Err(AppError::external_service(format!(
            "provisioning backend returned {status} for {resource}: {text}"
        )))
    }
}
