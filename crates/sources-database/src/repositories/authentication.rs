//! Authentication store backed by PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;

use sources_core::result::AppResult;
use sources_entity::Authentication;

use super::db_error;
use crate::store::AuthenticationStore;

/// Upper bound on the authentications listed for a single application.
const APPLICATION_AUTHENTICATION_LIMIT: i64 = 100;

/// Repository for authentications.
#[derive(Debug, Clone)]
pub struct PgAuthenticationStore {
    pool: PgPool,
}

impl PgAuthenticationStore {
    /// Create a new authentication store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthenticationStore for PgAuthenticationStore {
    async fn list_for_application(
        &self,
        tenant_id: i64,
        application_id: i64,
    ) -> AppResult<Vec<Authentication>> {
        sqlx::query_as::<_, Authentication>(
            "SELECT * FROM authentications \
             WHERE tenant_id = $1 AND resource_type = 'Application' AND resource_id = $2 \
             ORDER BY id LIMIT $3",
        )
        .bind(tenant_id)
        .bind(application_id)
        .bind(APPLICATION_AUTHENTICATION_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list application authentications"))
    }

    async fn list_ids_for_resources(
        &self,
        tenant_id: i64,
        resource_type: &str,
        resource_ids: &[i64],
    ) -> AppResult<Vec<i64>> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM authentications \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = ANY($3) \
             ORDER BY id",
        )
        .bind(tenant_id)
        .bind(resource_type)
        .bind(resource_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list resource authentications"))
    }

    async fn bulk_delete(&self, tenant_id: i64, ids: &[i64]) -> AppResult<Vec<Authentication>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Authentication>(
            "DELETE FROM authentications WHERE tenant_id = $1 AND id = ANY($2) RETURNING *",
        )
        .bind(tenant_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to delete authentications"))
    }
}
