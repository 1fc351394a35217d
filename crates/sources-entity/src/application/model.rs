//! Application entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::availability::AvailabilityStatus;
use crate::application_authentication::ApplicationAuthentication;
use crate::source::Source;
use crate::tenant::Tenant;

/// A capability attached to a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Application {
    /// Primary key.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: i64,
    /// Parent source.
    pub source_id: i64,
    /// Application type.
    pub application_type_id: i64,
    /// Raw availability status column.
    pub availability_status: Option<String>,
    /// Last availability error reported by the checker.
    pub availability_status_error: Option<String>,
    /// Number of create re-announcements attempted by the reconciliation sweep.
    pub retry_counter: i32,
    /// Provisioning state recorded by the Superkey backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superkey_data: Option<serde_json::Value>,
    /// Free-form application settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// Parsed availability status.
    pub fn status(&self) -> Option<AvailabilityStatus> {
        AvailabilityStatus::parse(self.availability_status.as_deref())
    }

    /// Whether the application currently reports itself as available.
    pub fn is_available(&self) -> bool {
        self.status() == Some(AvailabilityStatus::Available)
    }
}

/// Projection of an application selected by the reconciliation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RetryCandidate {
    /// Application primary key.
    pub id: i64,
    /// Owning tenant.
    pub tenant_id: i64,
    /// Application type, used for the retry opt-in lookup.
    pub application_type_id: i64,
}

/// An application loaded together with the rows its create events mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationWithRelations {
    /// The application itself.
    pub application: Application,
    /// Its parent source.
    pub source: Source,
    /// Its tenant.
    pub tenant: Tenant,
    /// Links between the application and its authentications.
    pub application_authentications: Vec<ApplicationAuthentication>,
}
