//! Red Hat Connector connection entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A connector linked to one or more sources through
/// `source_rhc_connections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RhcConnection {
    pub id: i64,
    /// Connector client id.
    pub rhc_id: String,
    pub extra: Option<serde_json::Value>,
    pub availability_status: Option<String>,
    pub availability_status_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
