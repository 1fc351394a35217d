//! # sources-core
//!
//! Core crate for the Sources background job subsystem. Contains the
//! collaborator traits consumed by the jobs, configuration schemas,
//! shared value types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Sources crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
