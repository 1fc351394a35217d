//! Endpoint entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A network endpoint belonging to a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Endpoint {
    /// Primary key.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: i64,
    /// Parent source.
    pub source_id: i64,
    /// Host name.
    pub host: Option<String>,
    /// URL scheme.
    pub scheme: Option<String>,
    /// Port.
    pub port: Option<i32>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}
