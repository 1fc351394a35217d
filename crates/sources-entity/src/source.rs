//! Source entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A connected external platform or account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Source {
    /// Primary key.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: i64,
    /// Source type (e.g. amazon, azure).
    pub source_type_id: i64,
    /// Display name.
    pub name: String,
    /// External unique identifier.
    pub uid: Option<String>,
    /// Raw availability status column.
    pub availability_status: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}
