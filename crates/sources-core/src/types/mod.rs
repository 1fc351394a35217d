//! Shared value types used across crate boundaries.

pub mod headers;
pub mod resource;

pub use headers::ForwardableHeader;
pub use resource::{ResourceKind, ResourceRef};
