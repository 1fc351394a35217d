//! Redis client and list/pub-sub operations.

pub mod client;
pub mod operations;

pub use client::RedisClient;
