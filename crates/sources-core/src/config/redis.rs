//! Redis connection and durable queue configuration.

use serde::{Deserialize, Serialize};

/// Redis configuration shared by the durable job queue, the event
/// stream publisher, and the worker health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Name of the list backing the durable job queue.
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    /// Seconds a blocking pop waits before returning empty-handed.
    #[serde(default = "default_pop_timeout")]
    pub pop_timeout_seconds: u64,
    /// Channel the event stream is published on.
    #[serde(default = "default_event_channel")]
    pub event_channel: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            queue_name: default_queue_name(),
            pop_timeout_seconds: default_pop_timeout(),
            event_channel: default_event_channel(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_queue_name() -> String {
    "sources_api_jobs".to_string()
}

fn default_pop_timeout() -> u64 {
    1
}

fn default_event_channel() -> String {
    "platform.sources.event-stream".to_string()
}
