//! Provisioning backend client trait.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{ForwardableHeader, ResourceRef};

/// Client for the external provisioning backend that owns the cloud-side
/// side effects (IAM roles, policies, ...) of Superkey-managed resources.
#[async_trait]
pub trait ProvisioningClient: Send + Sync + std::fmt::Debug + 'static {
    /// Ask the backend to tear down everything it created for `resource`.
    ///
    /// An `Ok` means the backend accepted the request; the local rows may
    /// then be scheduled for deletion.
    async fn send_delete_request(
        &self,
        identity: &str,
        resource: &ResourceRef,
        headers: &[ForwardableHeader],
    ) -> AppResult<()>;
}
