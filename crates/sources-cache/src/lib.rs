//! # sources-cache
//!
//! Redis access shared by the durable job queue, the Redis event sender and
//! the worker health check. The connection manager reconnects on its own, so
//! a single [`RedisClient`](redis::RedisClient) is cloned into every user.

#[cfg(feature = "redis-backend")]
pub mod redis;

#[cfg(feature = "redis-backend")]
pub use crate::redis::RedisClient;
