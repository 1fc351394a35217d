//! Worker liveness endpoint.
//!
//! A probe loop pings the queue backend and records the last success;
//! `GET /health` answers 500 once that success is older than
//! [`STALE_AFTER`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::sync::{RwLock, watch};
use tokio::time::Instant;

use sources_core::error::{AppError, ErrorKind};
use sources_core::result::AppResult;

/// Time between two probes.
pub const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Age of the last successful probe after which the worker reports unhealthy.
pub const STALE_AFTER: Duration = Duration::from_secs(30);

/// A dependency the worker cannot run without.
#[async_trait]
pub trait HealthProbe: Send + Sync + std::fmt::Debug {
    async fn ping(&self) -> AppResult<()>;
}

#[cfg(feature = "redis-queue")]
#[async_trait]
impl HealthProbe for sources_cache::RedisClient {
    async fn ping(&self) -> AppResult<()> {
        let latency_ms = sources_cache::RedisClient::ping(self).await?;
        tracing::trace!(latency_ms = latency_ms as u64, "Redis answered PING");
        Ok(())
    }
}

/// Shared record of the last successful probe.
#[derive(Debug, Clone)]
pub struct HealthState {
    last_success: Option<Arc<RwLock<Instant>>>,
}

impl HealthState {
    /// State fed by a probe loop, healthy until [`STALE_AFTER`] elapsed.
    pub fn new() -> Self {
        Self {
            last_success: Some(Arc::new(RwLock::new(Instant::now()))),
        }
    }

    /// State for a worker without external dependencies. Always healthy.
    pub fn unprobed() -> Self {
        Self { last_success: None }
    }

    pub async fn record_success(&self) {
        if let Some(last) = &self.last_success {
            *last.write().await = Instant::now();
        }
    }

    pub async fn is_healthy(&self) -> bool {
        match &self.last_success {
            Some(last) => last.read().await.elapsed() <= STALE_AFTER,
            None => true,
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `/health` router.
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<HealthState>) -> (StatusCode, &'static str) {
    if state.is_healthy().await {
        (StatusCode::OK, "OK")
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to hit redis for more than 30 seconds.",
        )
    }
}

/// Probe every [`PING_INTERVAL`] until cancelled.
pub async fn run_probe(
    probe: Arc<dyn HealthProbe>,
    state: HealthState,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(PING_INTERVAL);
    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => match probe.ping().await {
                Ok(()) => state.record_success().await,
                Err(e) => tracing::warn!("Failed to hit redis: {}", e),
            },
        }
    }
    tracing::debug!("Health probe stopped");
}

/// Serve `/health` on `port` until cancelled.
pub async fn serve(
    port: u16,
    state: HealthState,
    mut cancel: watch::Receiver<bool>,
) -> AppResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Internal,
            format!("Failed to bind health listener on {addr}"),
            e,
        )
    })?;
    tracing::info!("Health endpoint listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while cancel.changed().await.is_ok() {
                if *cancel.borrow() {
                    break;
                }
            }
        })
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Health listener failed", e))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    async fn status(state: HealthState) -> StatusCode {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        router(state).oneshot(request).await.unwrap().status()
    }

    #[derive(Debug, Default)]
    struct FlakyProbe {
        down: AtomicBool,
    }

    #[async_trait]
    impl HealthProbe for FlakyProbe {
        async fn ping(&self) -> AppResult<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(AppError::cache("connection refused"));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_state_is_healthy_then_goes_stale() {
        let state = HealthState::new();
        assert_eq!(status(state.clone()).await, StatusCode::OK);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(status(state.clone()).await, StatusCode::INTERNAL_SERVER_ERROR);

        state.record_success().await;
        assert_eq!(status(state).await, StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_keeps_state_fresh_until_backend_fails() {
        let probe = Arc::new(FlakyProbe::default());
        let state = HealthState::new();
        let (cancel, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(run_probe(probe.clone(), state.clone(), cancel_rx));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(state.is_healthy().await);

        probe.down.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!state.is_healthy().await);

        cancel.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unprobed_state_is_always_healthy() {
        let state = HealthState::unprobed();
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(status(state).await, StatusCode::OK);
    }
}
