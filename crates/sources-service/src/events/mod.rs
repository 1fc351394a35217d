//! Event stream senders.

pub mod memory_stream;
#[cfg(feature = "redis-events")]
pub mod redis_stream;

use serde::{Deserialize, Serialize};

use sources_core::types::ForwardableHeader;
use sources_core::types::headers::EVENT_TYPE_HEADER;

pub use memory_stream::MemoryEventSender;
#[cfg(feature = "redis-events")]
pub use redis_stream::RedisEventSender;

/// A raised event as it travels on the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// `"<Model>.<action>"`, for example `"Source.destroy"`.
    pub event_type: String,
    /// Forwarded headers followed by the `event_type` header.
    pub headers: Vec<ForwardableHeader>,
    /// The serialized resource.
    pub payload: serde_json::Value,
}

impl EventMessage {
    /// Build a message, appending the `event_type` header to the forwarded ones.
    pub fn new(
        event_type: &str,
        payload: serde_json::Value,
        headers: &[ForwardableHeader],
    ) -> Self {
        let mut all = Vec::with_capacity(headers.len() + 1);
        all.extend(
            headers
                .iter()
                .filter(|h| !h.key.eq_ignore_ascii_case(EVENT_TYPE_HEADER))
                .cloned(),
        );
        all.push(ForwardableHeader::new(EVENT_TYPE_HEADER, event_type));
        Self {
            event_type: event_type.to_string(),
            headers: all,
            payload,
        }
    }
}
