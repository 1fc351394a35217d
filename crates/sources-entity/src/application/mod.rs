//! Application domain entities.

pub mod availability;
pub mod model;
pub mod superkey;

pub use availability::AvailabilityStatus;
pub use model::{Application, ApplicationWithRelations, RetryCandidate};
pub use superkey::SuperkeyData;
