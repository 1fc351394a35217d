//! Application store backed by PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use sources_core::error::AppError;
use sources_core::result::AppResult;
use sources_entity::application::AvailabilityStatus;
use sources_entity::{
    Application, ApplicationAuthentication, ApplicationWithRelations, RetryCandidate, Source,
    Tenant,
};

use super::db_error;
use crate::store::{ApplicationStore, RetryTransaction};

/// Meta-data key marking an application type as opted into create retries.
const RETRY_OPT_IN_KEY: &str = "retry_create";

/// Application reads and the reconciliation transaction.
#[derive(Debug, Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    /// Create a new application store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn begin_retry(&self) -> AppResult<Box<dyn RetryTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin retry transaction"))?;
        Ok(Box::new(PgRetryTransaction { tx }))
    }

    async fn find_with_relations(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<ApplicationWithRelations> {
        let application = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE id = $1 AND tenant_id = $2",
        )
        .bind(application_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to find application"))?
        .ok_or_else(|| AppError::not_found(format!("application {application_id} not found")))?;

        let source = sqlx::query_as::<_, Source>(
            "SELECT * FROM sources WHERE id = $1 AND tenant_id = $2",
        )
        .bind(application.source_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to find source"))?
        .ok_or_else(|| {
            AppError::not_found(format!("source {} not found", application.source_id))
        })?;

        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT id, external_tenant, org_id FROM tenants WHERE id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to find tenant"))?
        .ok_or_else(|| AppError::not_found(format!("tenant {tenant_id} not found")))?;

        let application_authentications = sqlx::query_as::<_, ApplicationAuthentication>(
            "SELECT * FROM application_authentications \
             WHERE application_id = $1 AND tenant_id = $2 ORDER BY id",
        )
        .bind(application_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list application authentications"))?;

        Ok(ApplicationWithRelations {
            application,
            source,
            tenant,
            application_authentications,
        })
    }

    async fn list_for_source(
        &self,
        tenant_id: i64,
        source_id: i64,
    ) -> AppResult<Vec<Application>> {
        sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE source_id = $1 AND tenant_id = $2 ORDER BY id",
        )
        .bind(source_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list source applications"))
    }

    async fn application_opted_into_retry(&self, application_type_id: i64) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM meta_data \
             WHERE resource_type = 'ApplicationType' AND resource_id = $1 AND key = $2)",
        )
        .bind(application_type_id)
        .bind(RETRY_OPT_IN_KEY)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to check retry opt-in"))
    }
}

/// Reconciliation transaction over a single PostgreSQL connection.
pub struct PgRetryTransaction {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PgRetryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgRetryTransaction").finish_non_exhaustive()
    }
}

#[async_trait]
impl RetryTransaction for PgRetryTransaction {
    async fn pin_available(&mut self, retry_max: i32) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE applications SET retry_counter = $1 \
             WHERE availability_status = $2 AND retry_counter < $1",
        )
        .bind(retry_max)
        .bind(AvailabilityStatus::Available.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to pin available applications"))?;
        Ok(result.rows_affected())
    }

    async fn find_retry_candidates(
        &mut self,
        created_after: DateTime<Utc>,
        retry_max: i32,
    ) -> AppResult<Vec<RetryCandidate>> {
        let candidates = sqlx::query_as::<_, RetryCandidate>(
            "SELECT id, tenant_id, application_type_id FROM applications \
             WHERE availability_status IS DISTINCT FROM $1 \
             AND created_at > $2 AND retry_counter < $3 \
             ORDER BY id",
        )
        .bind(AvailabilityStatus::Available.as_str())
        .bind(created_after)
        .bind(retry_max)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error("Failed to select retry candidates"))?;

        debug!(count = candidates.len(), "Selected retry candidates");
        Ok(candidates)
    }

    async fn increment_retry_counters(&mut self, ids: &[i64]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE applications SET retry_counter = retry_counter + 1 WHERE id = ANY($1)",
        )
        .bind(ids)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to increment retry counters"))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx
            .commit()
            .await
            .map_err(db_error("Failed to commit retry transaction"))
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(db_error("Failed to roll back retry transaction"))
    }
}
