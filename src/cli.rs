//! Command-line interface.

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use sources_core::config::AppConfig;
use sources_core::error::AppError;
use sources_core::types::ResourceKind;
use sources_worker::health::{self, HealthState};
use sources_worker::jobs::{AsyncDestroyJob, RetryCreateJob, SuperkeyDestroyJob};
use sources_worker::{Job, JobExecutor, JobSink, JobSource, Scheduler, WorkerRunner};

use crate::bootstrap;

/// Sources background job worker
#[derive(Debug, Parser)]
#[command(name = "sources-jobs", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the worker, the scheduler and the health endpoint until SIGINT/SIGTERM
    Run,
    /// Submit a job to the durable queue
    Enqueue(EnqueueArgs),
    /// Run one reconciliation sweep now
    Reconcile,
    /// Print the number of jobs waiting in the durable queue
    QueueStatus,
}

/// Arguments for `enqueue`
#[derive(Debug, Args)]
pub struct EnqueueArgs {
    #[command(subcommand)]
    pub job: EnqueueCommand,
}

/// Jobs that can be submitted by hand
#[derive(Debug, Subcommand)]
pub enum EnqueueCommand {
    /// Tear down a Superkey-managed source or application
    SuperkeyDestroy {
        /// Owning tenant id
        #[arg(long)]
        tenant: i64,
        /// `source` or `application`
        #[arg(long)]
        model: ResourceKind,
        /// Resource id
        #[arg(long)]
        id: i64,
        /// Base64 identity forwarded to the provisioning backend
        #[arg(long)]
        identity: String,
    },
    /// Delete a source or application with its dependants
    AsyncDestroy {
        /// Owning tenant id
        #[arg(long)]
        tenant: i64,
        /// `source` or `application`
        #[arg(long)]
        model: ResourceKind,
        /// Resource id
        #[arg(long)]
        id: i64,
        /// Seconds the worker waits before deleting
        #[arg(long, default_value_t = 0)]
        wait_seconds: u64,
    },
}

impl EnqueueCommand {
    fn into_job(self) -> Arc<dyn Job> {
        match self {
            Self::SuperkeyDestroy {
                tenant,
                model,
                id,
                identity,
            } => Arc::new(SuperkeyDestroyJob::new(tenant, model, id, identity, vec![])),
            Self::AsyncDestroy {
                tenant,
                model,
                id,
                wait_seconds,
            } => Arc::new(AsyncDestroyJob::new(tenant, model, id, wait_seconds, vec![])),
        }
    }
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self, config: AppConfig) -> Result<(), AppError> {
        match self.command {
            Command::Run => run(config).await,
            Command::Enqueue(args) => enqueue(config, args.job).await,
            Command::Reconcile => reconcile(config).await,
            Command::QueueStatus => queue_status(config).await,
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting sources-jobs v{}", env!("CARGO_PKG_VERSION"));

    let services = bootstrap::build(&config).await?;
    let executor = Arc::new(JobExecutor::new(services.context.clone()));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let health_state = match &services.redis {
        Some(client) => {
            let state = HealthState::new();
            tasks.push(tokio::spawn(health::run_probe(
                Arc::new(client.clone()),
                state.clone(),
                cancel_rx.clone(),
            )));
            state
        }
        None => HealthState::unprobed(),
    };
    let health_port = config.worker.health_port;
    let health_cancel = cancel_rx.clone();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = health::serve(health_port, health_state, health_cancel).await {
            tracing::error!("Health endpoint stopped: {}", e);
        }
    }));

    let mut scheduler = Scheduler::new(Arc::clone(&executor));
    scheduler.register_default_jobs(&config.retry);
    tasks.extend(scheduler.start(cancel_rx.clone()));

    if config.worker.enabled {
        let mut runner = WorkerRunner::new(
            Arc::clone(&services.source),
            Arc::clone(&executor),
            &config.worker,
        );
        if let Some(sink) = &services.requeue {
            runner = runner.with_requeue(Arc::clone(sink));
        }
        let worker_cancel = cancel_rx.clone();
        tasks.push(tokio::spawn(async move { runner.run(worker_cancel).await }));
    } else {
        tracing::warn!("Worker disabled, only scheduled jobs will run");
    }

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping...");
    let _ = cancel_tx.send(true);

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Background task failed: {}", e);
        }
    }

    services.db.close().await;
    tracing::info!("sources-jobs stopped");
    Ok(())
}

async fn enqueue(config: AppConfig, command: EnqueueCommand) -> Result<(), AppError> {
    let redis = bootstrap::connect_redis(&config).await?;
    let queue = bootstrap::durable_queue(&config, redis);
    let job = command.into_job();
    let name = job.name();

    queue.enqueue(job).await?;
    println!("Submitted {} to '{}'", name, queue.list());
    Ok(())
}

async fn reconcile(config: AppConfig) -> Result<(), AppError> {
    let services = bootstrap::build(&config).await?;
    let executor = JobExecutor::new(services.context.clone());

    let result = executor.run_now(Arc::new(RetryCreateJob)).await;
    services.db.close().await;
    result.map_err(|e| AppError::internal(format!("Reconciliation failed: {e}")))
}

async fn queue_status(config: AppConfig) -> Result<(), AppError> {
    let redis = bootstrap::connect_redis(&config).await?;
    let queue = bootstrap::durable_queue(&config, redis);
    let length = queue.len().await?;

    println!("Queue '{}': {} job(s) waiting", queue.list(), length);
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
