//! PostgreSQL pool shared by the Sources stores.

use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use sources_core::config::DatabaseConfig;
use sources_core::error::{AppError, ErrorKind};
use sources_core::result::AppResult;

use crate::repositories::{PgApplicationStore, PgAuthenticationStore, PgCascadeStore};

/// Name reported in `pg_stat_activity`.
const APPLICATION_NAME: &str = "sources-jobs";

/// Connection pool handing out the PostgreSQL stores.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open the pool described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let options = connect_options(&config.url)?;
        info!(
            host = options.get_host(),
            port = options.get_port(),
            database = options.get_database().unwrap_or_default(),
            max_connections = config.max_connections,
            "Opening sources database pool"
        );

        let pool = pool_options(config)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Sources database unreachable: {e}"),
                    e,
                )
            })?;

        Ok(Self { pool })
    }

    /// Application store sharing this pool.
    pub fn application_store(&self) -> PgApplicationStore {
        PgApplicationStore::new(self.pool.clone())
    }

    /// Authentication store sharing this pool.
    pub fn authentication_store(&self) -> PgAuthenticationStore {
        PgAuthenticationStore::new(self.pool.clone())
    }

    /// Cascade-delete store sharing this pool.
    pub fn cascade_store(&self) -> PgCascadeStore {
        PgCascadeStore::new(self.pool.clone())
    }

    /// Wait for checked-out connections and close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Sources database pool closed");
    }
}

/// Parse the database URL. Credentials never reach the logs because only
/// the parsed host, port and database name are reported.
fn connect_options(url: &str) -> AppResult<PgConnectOptions> {
    let options: PgConnectOptions = url.parse().map_err(|e| {
        AppError::with_source(
            ErrorKind::Configuration,
            "database.url is not a valid PostgreSQL URL",
            e,
        )
    })?;
    Ok(options.application_name(APPLICATION_NAME))
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
}
