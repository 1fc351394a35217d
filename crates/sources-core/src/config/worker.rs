//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Where the worker takes its jobs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// Durable Redis list shared across processes.
    Redis,
    /// In-process queue; jobs are lost on restart.
    Memory,
}

/// What the in-process queue does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until a slot frees up.
    Block,
    /// Evict the oldest queued job to make room.
    DropOldest,
    /// Refuse the new job with an error.
    Reject,
}

/// Background job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Queue backend.
    #[serde(default = "default_mode")]
    pub mode: QueueMode,
    /// Number of jobs executed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Capacity of the in-process queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Behaviour of the in-process queue when full.
    #[serde(default = "default_overflow_policy")]
    pub overflow_policy: OverflowPolicy,
    /// Maximum number of dequeued jobs waiting for their delay to elapse.
    #[serde(default = "default_max_delayed")]
    pub max_delayed_jobs: usize,
    /// Port of the `/health` listener.
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            mode: default_mode(),
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
            overflow_policy: default_overflow_policy(),
            max_delayed_jobs: default_max_delayed(),
            health_port: default_health_port(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_mode() -> QueueMode {
    QueueMode::Redis
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_overflow_policy() -> OverflowPolicy {
    OverflowPolicy::Block
}

fn default_max_delayed() -> usize {
    10_000
}

fn default_health_port() -> u16 {
    8000
}
