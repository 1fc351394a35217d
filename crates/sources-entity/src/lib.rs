//! # sources-entity
//!
//! Domain entity models read and written by the Sources background jobs.
//! Every struct in this crate represents a database table row or a domain
//! value object. Database entities additionally derive `sqlx::FromRow`.

pub mod application;
pub mod application_authentication;
pub mod authentication;
pub mod endpoint;
pub mod rhc_connection;
pub mod source;
pub mod tenant;

pub use application::{Application, ApplicationWithRelations, AvailabilityStatus, RetryCandidate};
pub use application_authentication::ApplicationAuthentication;
pub use authentication::Authentication;
pub use endpoint::Endpoint;
pub use rhc_connection::RhcConnection;
pub use source::Source;
pub use tenant::Tenant;
