//! Event sender recording events in memory.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use sources_core::error::AppError;
use sources_core::result::AppResult;
use sources_core::traits::EventSender;
use sources_core::types::ForwardableHeader;

use super::EventMessage;

#[derive(Debug, Default)]
struct Recorded {
    events: Vec<EventMessage>,
    failing: HashSet<String>,
}

/// Keeps every raised event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSender {
    inner: Arc<RwLock<Recorded>>,
}

impl MemoryEventSender {
    /// Create an empty sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every later event of `event_type`.
    pub async fn fail_on(&self, event_type: &str) {
        self.inner.write().await.failing.insert(event_type.to_string());
    }

    /// All recorded events, oldest first.
    pub async fn events(&self) -> Vec<EventMessage> {
        self.inner.read().await.events.clone()
    }

    /// Event types of all recorded events, oldest first.
    pub async fn event_types(&self) -> Vec<String> {
        self.inner
            .read()
            .await
            .events
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Number of recorded events of `event_type`.
    pub async fn count(&self, event_type: &str) -> usize {
        self.inner
            .read()
            .await
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl EventSender for MemoryEventSender {
    async fn raise_event(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        headers: &[ForwardableHeader],
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.failing.contains(event_type) {
            return Err(AppError::service_unavailable(format!(
                "event stream rejected {event_type}"
            )));
        }
        debug!(event_type, "Event recorded");
        inner
            .events
            .push(EventMessage::new(event_type, payload, headers));
        Ok(())
    }
}
