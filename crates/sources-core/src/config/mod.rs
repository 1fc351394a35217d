//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod logging;
pub mod redis;
pub mod retry;
pub mod superkey;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::redis::RedisConfig;
pub use self::retry::RetryConfig;
pub use self::superkey::SuperkeyConfig;
pub use self::worker::{OverflowPolicy, QueueMode, WorkerConfig};

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay) and `SOURCES__*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Redis connection and durable queue settings.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Reconciliation (retry create) settings.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Provisioning backend settings.
    #[serde(default)]
    pub superkey: SuperkeyConfig,
    /// Event stream settings.
    #[serde(default)]
    pub events: EventsConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Event sender backend: `"redis"` or `"memory"`.
    #[serde(default = "default_events_backend")]
    pub backend: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            backend: default_events_backend(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config/default.toml` with `config/{env}.toml` and environment
    /// variables prefixed with `SOURCES__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SOURCES")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

fn default_events_backend() -> String {
    "redis".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[database]\nurl = \"postgres://localhost/sources\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.redis.queue_name, "sources_api_jobs");
        assert_eq!(config.retry.retry_max, 5);
        assert_eq!(config.retry.interval_seconds, 120);
        assert_eq!(config.retry.record_age_limit_minutes, 30);
        assert_eq!(config.worker.mode, QueueMode::Redis);
        assert_eq!(config.worker.overflow_policy, OverflowPolicy::Block);
        assert_eq!(config.events.backend, "redis");
        assert_eq!(config.database.max_connections, 20);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [database]
                url = "postgres://localhost/sources"

                [logging]
                format = "pretty"

                [worker]
                mode = "memory"
                overflow_policy = "drop_oldest"
                concurrency = 2
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.worker.mode, QueueMode::Memory);
        assert_eq!(config.worker.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
