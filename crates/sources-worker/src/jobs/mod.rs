//! Built-in job implementations.

pub mod async_destroy;
pub mod retry_create;
pub mod superkey_destroy;

pub use async_destroy::AsyncDestroyJob;
pub use retry_create::RetryCreateJob;
pub use superkey_destroy::SuperkeyDestroyJob;
