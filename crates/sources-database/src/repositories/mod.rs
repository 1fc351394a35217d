//! PostgreSQL store implementations.

pub mod application;
pub mod authentication;
pub mod cascade;

pub use application::{PgApplicationStore, PgRetryTransaction};
pub use authentication::PgAuthenticationStore;
pub use cascade::PgCascadeStore;

use sources_core::error::{AppError, ErrorKind};

/// Map an sqlx error into a database [`AppError`] with context.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}
