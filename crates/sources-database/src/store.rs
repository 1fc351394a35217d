//! Store traits consumed by the background jobs.
//!
//! Each trait has a PostgreSQL implementation in [`crate::repositories`]
//! and an in-memory implementation in `crate::memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sources_core::result::AppResult;
use sources_entity::{
    Application, ApplicationAuthentication, ApplicationWithRelations, Authentication, Endpoint,
    RetryCandidate, RhcConnection, Source,
};

/// A store transaction scoped to the reconciliation sweep.
///
/// Dropping the transaction without calling [`commit`](Self::commit) rolls
/// it back.
#[async_trait]
pub trait RetryTransaction: Send {
    /// Set `retry_counter = retry_max` on every available application whose
    /// counter is still below `retry_max`. Returns the number of rows updated.
    async fn pin_available(&mut self, retry_max: i32) -> AppResult<u64>;

    /// Select applications that are not available, were created after
    /// `created_after`, and whose counter is below `retry_max`.
    async fn find_retry_candidates(
        &mut self,
        created_after: DateTime<Utc>,
        retry_max: i32,
    ) -> AppResult<Vec<RetryCandidate>>;

    /// Increment `retry_counter` by one for each of `ids`.
    async fn increment_retry_counters(&mut self, ids: &[i64]) -> AppResult<u64>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Application reads and the reconciliation transaction.
#[async_trait]
pub trait ApplicationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Open a reconciliation transaction.
    async fn begin_retry(&self) -> AppResult<Box<dyn RetryTransaction>>;

    /// Load an application with its source, tenant, and application
    /// authentications.
    async fn find_with_relations(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<ApplicationWithRelations>;

    /// List the applications attached to a source.
    async fn list_for_source(&self, tenant_id: i64, source_id: i64)
    -> AppResult<Vec<Application>>;

    /// Whether applications of this type opted into create retries.
    async fn application_opted_into_retry(&self, application_type_id: i64) -> AppResult<bool>;
}

/// Authentication reads and bulk deletion.
#[async_trait]
pub trait AuthenticationStore: Send + Sync + std::fmt::Debug + 'static {
    /// List the authentications owned by an application.
    async fn list_for_application(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<Vec<Authentication>>;

    /// List the ids of the authentications owned by any of `resource_ids`
    /// of the given model (`"Source"`, `"Application"`, `"Endpoint"`).
    async fn list_ids_for_resources(
        &self,
        tenant_id: i64,
        resource_type: &str,
        resource_ids: &[i64],
    ) -> AppResult<Vec<i64>>;

    /// Delete the given authentications and return the deleted rows.
    async fn bulk_delete(&self, tenant_id: i64, ids: &[i64]) -> AppResult<Vec<Authentication>>;
}

/// Rows removed by a source cascade delete.
#[derive(Debug, Clone)]
pub struct SourceCascade {
    /// Deleted links between the source's applications and authentications.
    pub application_authentications: Vec<ApplicationAuthentication>,
    /// Deleted applications.
    pub applications: Vec<Application>,
    /// Deleted endpoints.
    pub endpoints: Vec<Endpoint>,
    /// Deleted connector connections that were linked to the source.
    pub rhc_connections: Vec<RhcConnection>,
    /// The deleted source.
    pub source: Source,
}

/// Rows removed by an application cascade delete.
#[derive(Debug, Clone)]
pub struct ApplicationCascade {
    /// Deleted links between the application and its authentications.
    pub application_authentications: Vec<ApplicationAuthentication>,
    /// The deleted application.
    pub application: Application,
}

/// Transactional cascade deletes.
#[async_trait]
pub trait CascadeStore: Send + Sync + std::fmt::Debug + 'static {
    /// Delete a source with its applications and their links, its endpoints
    /// and its connector connections. A missing source is `NotFound` and
    /// deletes nothing.
    async fn delete_source_cascade(&self, tenant_id: i64, source_id: i64)
    -> AppResult<SourceCascade>;

    /// Delete an application and its authentication links.
    async fn delete_application_cascade(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<ApplicationCascade>;
}
