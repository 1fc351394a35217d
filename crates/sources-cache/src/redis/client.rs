//! Redis connection management.

use std::time::Duration;

use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::info;

use sources_core::config::RedisConfig;
use sources_core::error::{AppError, ErrorKind};
use sources_core::result::AppResult;

/// Headroom added on top of the blocking-pop timeout before the connection
/// gives up waiting for a reply.
const BLOCKING_REPLY_MARGIN: Duration = Duration::from_secs(5);

/// Redis client wrapper with connection management.
#[derive(Clone)]
pub struct RedisClient {
    /// Connection for regular request/reply commands.
    conn: ConnectionManager,
    /// Connection reserved for blocking pops, so they never delay other
    /// commands multiplexed on `conn`.
    blocking: ConnectionManager,
    /// Server-side timeout for blocking pops.
    pop_timeout: Duration,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("pop_timeout", &self.pop_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisClient {
    /// Create a new Redis client from configuration.
    pub async fn connect(config: &RedisConfig) -> AppResult<Self> {
        info!(url = %mask_redis_url(&config.url), "Connecting to Redis");

        let client = Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to create Redis client", e)
        })?;

        let conn = ConnectionManager::new(client.clone()).await.map_err(|e| {
            AppError::with_source(ErrorKind::Cache, "Failed to connect to Redis", e)
        })?;

        let pop_timeout = Duration::from_secs(config.pop_timeout_seconds.max(1));
        let blocking_config = ConnectionManagerConfig::new()
            .set_response_timeout(Some(pop_timeout + BLOCKING_REPLY_MARGIN));
        let blocking = ConnectionManager::new_with_config(client, blocking_config)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Cache, "Failed to connect to Redis", e)
            })?;

        info!("Successfully connected to Redis");
        Ok(Self {
            conn,
            blocking,
            pop_timeout,
        })
    }

    /// Get a mutable clone of the request/reply connection.
    pub fn conn_mut(&self) -> ConnectionManager {
        self.conn.clone()
    }

    /// Get a mutable clone of the blocking-pop connection.
    pub(crate) fn blocking_conn(&self) -> ConnectionManager {
        self.blocking.clone()
    }

    /// Server-side timeout for blocking pops.
    pub fn pop_timeout(&self) -> Duration {
        self.pop_timeout
    }

    /// Map a Redis error to an AppError.
    pub(crate) fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Cache, format!("Redis error: {e}"), e)
    }
}

/// Mask password in Redis URL for safe logging.
pub fn mask_redis_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
