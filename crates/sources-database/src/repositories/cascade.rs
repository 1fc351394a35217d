//! Transactional cascade deletes backed by PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use sources_core::error::AppError;
use sources_core::result::AppResult;
use sources_entity::{Application, ApplicationAuthentication, Endpoint, RhcConnection, Source};

use super::db_error;
use crate::store::{ApplicationCascade, CascadeStore, SourceCascade};

/// Deletes sources and applications together with their dependents.
#[derive(Debug, Clone)]
pub struct PgCascadeStore {
    pool: PgPool,
}

impl PgCascadeStore {
    /// Create a new cascade store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CascadeStore for PgCascadeStore {
    async fn delete_source_cascade(
        &self,
        tenant_id: i64,
        source_id: i64,
    ) -> AppResult<SourceCascade> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin cascade transaction"))?;

        let application_authentications = sqlx::query_as::<_, ApplicationAuthentication>(
            "DELETE FROM application_authentications \
             WHERE tenant_id = $1 AND application_id IN \
             (SELECT id FROM applications WHERE source_id = $2 AND tenant_id = $1) \
             RETURNING *",
        )
        .bind(tenant_id)
        .bind(source_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to delete application authentications"))?;

        let applications = sqlx::query_as::<_, Application>(
            "DELETE FROM applications WHERE source_id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(source_id)
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to delete applications"))?;

        let endpoints = sqlx::query_as::<_, Endpoint>(
            "DELETE FROM endpoints WHERE source_id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(source_id)
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to delete endpoints"))?;

        let rhc_connections = sqlx::query_as::<_, RhcConnection>(
            "WITH links AS ( \
                DELETE FROM source_rhc_connections \
                WHERE source_id = $1 AND tenant_id = $2 \
                RETURNING rhc_connection_id) \
             DELETE FROM rhc_connections \
             WHERE id IN (SELECT rhc_connection_id FROM links) \
             RETURNING *",
        )
        .bind(source_id)
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to delete rhc connections"))?;

        let source = sqlx::query_as::<_, Source>(
            "DELETE FROM sources WHERE id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(source_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to delete source"))?;

        let Some(source) = source else {
            return Err(AppError::not_found(format!("source {source_id} not found")));
        };

        tx.commit()
            .await
            .map_err(db_error("Failed to commit cascade transaction"))?;

        info!(
            source_id,
            tenant_id,
            applications = applications.len(),
            endpoints = endpoints.len(),
            rhc_connections = rhc_connections.len(),
            "Source cascade deleted"
        );

        Ok(SourceCascade {
            application_authentications,
            applications,
            endpoints,
            rhc_connections,
            source,
        })
    }

    async fn delete_application_cascade(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<ApplicationCascade> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin cascade transaction"))?;

        let application_authentications = sqlx::query_as::<_, ApplicationAuthentication>(
            "DELETE FROM application_authentications \
             WHERE application_id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(application_id)
        .bind(tenant_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to delete application authentications"))?;

        let application = sqlx::query_as::<_, Application>(
            "DELETE FROM applications WHERE id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(application_id)
        .bind(tenant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to delete application"))?;

        let Some(application) = application else {
            // Dropping the transaction rolls back the link deletes.
            return Err(AppError::not_found(format!(
                "application {application_id} not found"
            )));
        };

        tx.commit()
            .await
            .map_err(db_error("Failed to commit cascade transaction"))?;

        info!(application_id, tenant_id, "Application cascade deleted");

        Ok(ApplicationCascade {
            application_authentications,
            application,
        })
    }
}
