//! Collaborator traits defined in `sources-core` and implemented by other crates.

pub mod deleter;
pub mod events;
pub mod provisioning;

pub use deleter::ResourceDeleter;
pub use events::EventSender;
pub use provisioning::ProvisioningClient;
