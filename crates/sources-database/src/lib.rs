//! # sources-database
//!
//! PostgreSQL connection management, the store traits consumed by the
//! background jobs, and their implementations:
//!
//! - **repositories**: PostgreSQL-backed stores using sqlx
//! - **memory**: in-process store with the same transactional semantics,
//!   used by tests and local runs

pub mod connection;
#[cfg(feature = "memory")]
pub mod memory;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{
    ApplicationCascade, ApplicationStore, AuthenticationStore, CascadeStore, RetryTransaction,
    SourceCascade,
};
