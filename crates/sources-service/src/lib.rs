//! # sources-service
//!
//! Concrete collaborators used by the background jobs:
//!
//! - **events**: event stream senders (Redis pub/sub and in-memory)
//! - **cascade**: cascading resource deletion with destroy events
//! - **provisioning**: HTTP client for the Superkey provisioning backend

pub mod cascade;
pub mod events;
pub mod provisioning;

pub use cascade::CascadeDeleter;
pub use events::MemoryEventSender;
#[cfg(feature = "redis-events")]
pub use events::RedisEventSender;
pub use provisioning::HttpProvisioningClient;
