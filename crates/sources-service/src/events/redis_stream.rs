//! Event sender publishing on a Redis channel.

use async_trait::async_trait;
use tracing::debug;

use sources_cache::RedisClient;
use sources_core::result::AppResult;
use sources_core::traits::EventSender;
use sources_core::types::ForwardableHeader;

use super::EventMessage;

/// Publishes every event as a JSON [`EventMessage`] on one Redis channel.
#[derive(Debug, Clone)]
pub struct RedisEventSender {
    client: RedisClient,
    channel: String,
}

impl RedisEventSender {
    /// Create a sender publishing on `channel`.
    pub fn new(client: RedisClient, channel: impl Into<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl EventSender for RedisEventSender {
    async fn raise_event(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        headers: &[ForwardableHeader],
    ) -> AppResult<()> {
        let message = serde_json::to_string(&EventMessage::new(event_type, payload, headers))?;
        let receivers = self.client.publish(&self.channel, &message).await?;
        debug!(event_type, channel = %self.channel, receivers, "Event published");
        Ok(())
    }
}
