//! Event stream sender trait.

use async_trait::async_trait;
use serde::Serialize;

use crate::result::AppResult;
use crate::types::ForwardableHeader;

/// Trait for event stream backends (Redis pub/sub or in-memory).
///
/// Event types follow the `"<Model>.<action>"` convention, for example
/// `"Application.create"` or `"Source.destroy"`.
#[async_trait]
pub trait EventSender: Send + Sync + std::fmt::Debug + 'static {
    /// Publish one event with an already serialized payload.
    async fn raise_event(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        headers: &[ForwardableHeader],
    ) -> AppResult<()>;
}

/// Serialize `resource` and publish it as `event_type`.
pub async fn raise<T: Serialize + ?Sized>(
    sender: &dyn EventSender,
    event_type: &str,
    resource: &T,
    headers: &[ForwardableHeader],
) -> AppResult<()> {
    let payload = serde_json::to_value(resource)?;
    sender.raise_event(event_type, payload, headers).await
}
