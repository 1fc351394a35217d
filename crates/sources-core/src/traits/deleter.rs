//! Cascading resource deletion trait.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::{ForwardableHeader, ResourceRef};

/// Deletes a resource and everything that depends on it, announcing each
/// deleted row downstream with the forwarded headers.
#[async_trait]
pub trait ResourceDeleter: Send + Sync + std::fmt::Debug + 'static {
    /// Delete `resource` and its dependants.
    async fn delete_cascade(
        &self,
        resource: &ResourceRef,
        headers: &[ForwardableHeader],
    ) -> AppResult<()>;
}
