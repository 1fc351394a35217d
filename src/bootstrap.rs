//! Wiring of stores, queues, event senders and clients from configuration.

use std::sync::Arc;

use sources_cache::RedisClient;
use sources_core::config::{AppConfig, QueueMode};
use sources_core::error::AppError;
use sources_core::result::AppResult;
use sources_core::traits::EventSender;
use sources_database::DatabasePool;
use sources_service::{CascadeDeleter, HttpProvisioningClient, MemoryEventSender, RedisEventSender};
use sources_worker::{JobContext, JobRegistry, JobSink, JobSource, MemoryQueue, RedisJobQueue};

/// Everything a worker process needs.
#[derive(Debug)]
pub struct Services {
    pub db: DatabasePool,
    pub redis: Option<RedisClient>,
    pub context: JobContext,
    pub source: Arc<dyn JobSource>,
    /// Where the worker returns unstarted jobs on shutdown. Only set for the
    /// durable queue.
    pub requeue: Option<Arc<dyn JobSink>>,
}

/// Connect to Redis.
pub async fn connect_redis(config: &AppConfig) -> AppResult<RedisClient> {
    RedisClient::connect(&config.redis).await
}

/// The durable queue on the configured Redis list.
pub fn durable_queue(config: &AppConfig, redis: RedisClient) -> RedisJobQueue {
    let registry = JobRegistry::with_builtin_jobs();
    tracing::debug!(jobs = ?registry.names(), "Durable queue job registry ready");
    RedisJobQueue::new(redis, config.redis.queue_name.clone(), Arc::new(registry))
}

/// Connect every backend and build the job context.
pub async fn build(config: &AppConfig) -> AppResult<Services> {
    let db = DatabasePool::connect(&config.database).await?;

    let needs_redis = config.worker.mode == QueueMode::Redis || config.events.backend == "redis";
    let redis = if needs_redis {
        Some(connect_redis(config).await?)
    } else {
        None
    };

    let (queue, source, requeue): (Arc<dyn JobSink>, Arc<dyn JobSource>, _) =
        match (config.worker.mode, &redis) {
            (QueueMode::Redis, Some(client)) => {
                let queue = Arc::new(durable_queue(config, client.clone()));
                tracing::info!("Using durable job queue '{}'", queue.list());
                let sink: Arc<dyn JobSink> = queue.clone();
                let source: Arc<dyn JobSource> = queue;
                (sink.clone(), source, Some(sink))
            }
            _ => {
                let queue = Arc::new(MemoryQueue::new(
                    config.worker.queue_capacity,
                    config.worker.overflow_policy,
                ));
                tracing::info!(
                    "Using in-process job queue (capacity={}, overflow={:?})",
                    config.worker.queue_capacity,
                    config.worker.overflow_policy
                );
                let sink: Arc<dyn JobSink> = queue.clone();
                let source: Arc<dyn JobSource> = queue;
                (sink, source, None)
            }
        };

    let events: Arc<dyn EventSender> = match (config.events.backend.as_str(), &redis) {
        ("redis", Some(client)) => Arc::new(RedisEventSender::new(
            client.clone(),
            config.redis.event_channel.clone(),
        )),
        ("memory", _) => Arc::new(MemoryEventSender::new()),
        (other, _) => {
            return Err(AppError::configuration(format!(
                "Unsupported events backend: '{other}'"
            )));
        }
    };

    let applications = Arc::new(db.application_store());
    let authentications = Arc::new(db.authentication_store());
    let cascades = Arc::new(db.cascade_store());

    let provisioning = Arc::new(HttpProvisioningClient::new(
        &config.superkey,
        applications.clone(),
    )?);
    let deleter = Arc::new(CascadeDeleter::new(
        cascades,
        authentications.clone(),
        events.clone(),
    ));

    let context = JobContext {
        applications,
        authentications,
        events,
        provisioning,
        deleter,
        queue,
        retry: config.retry.clone(),
    };

    Ok(Services {
        db,
        redis,
        context,
        source,
        requeue,
    })
}
