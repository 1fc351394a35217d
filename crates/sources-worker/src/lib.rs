//! Background job orchestration for Sources.
//!
//! This crate provides:
//! - The [`Job`] abstraction and the name-tagged [`DispatchEnvelope`] used
//!   to move jobs through the durable queue
//! - In-process and Redis-backed job queues
//! - A worker runner that holds jobs until their delay elapsed and executes
//!   them on a bounded pool
//! - A scheduler driving periodic jobs
//! - The reconciliation and Superkey teardown jobs
//! - The worker health endpoint

pub mod delay;
pub mod envelope;
pub mod executor;
pub mod health;
pub mod job;
pub mod jobs;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use envelope::{DispatchEnvelope, JobRegistry};
pub use executor::{JobExecutionError, JobExecutor};
pub use job::{Job, JobContext};
pub use queue::{JobSink, JobSource, MemoryQueue};
#[cfg(feature = "redis-queue")]
pub use queue::RedisJobQueue;
pub use runner::WorkerRunner;
pub use scheduler::{ScheduledJob, Scheduler};

#[cfg(test)]
pub(crate) mod testing;
