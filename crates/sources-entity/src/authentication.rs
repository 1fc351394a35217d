//! Authentication entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Credential material attached to a source, application or endpoint.
///
/// Secrets never leave the store; only the descriptive columns are mapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Authentication {
    /// Primary key.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: i64,
    /// Model the authentication belongs to: `"Source"`, `"Application"` or `"Endpoint"`.
    pub resource_type: String,
    /// Primary key of the owning resource.
    pub resource_id: i64,
    /// Authentication type, e.g. `"access_key_secret_key"`.
    pub authtype: String,
    /// Optional username.
    pub username: Option<String>,
    /// Optional display name.
    pub name: Option<String>,
    /// Raw availability status column.
    pub availability_status: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}
