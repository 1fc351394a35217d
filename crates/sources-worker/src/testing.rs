//! Test doubles shared by the job, queue, and runner tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use sources_core::config::{OverflowPolicy, RetryConfig};
use sources_core::error::AppError;
use sources_core::result::AppResult;
use sources_core::traits::{ProvisioningClient, ResourceDeleter};
use sources_core::types::{ForwardableHeader, ResourceRef};
use sources_database::memory::MemoryStore;
use sources_service::MemoryEventSender;

use crate::executor::JobExecutionError;
use crate::job::{Job, JobContext};
use crate::queue::MemoryQueue;

/// Handles onto the fakes behind a test [`JobContext`].
#[derive(Debug, Clone)]
pub struct Fakes {
    pub store: MemoryStore,
    pub events: MemoryEventSender,
    pub provisioning: Arc<FakeProvisioning>,
    pub deleter: Arc<FakeDeleter>,
    pub queue: Arc<MemoryQueue>,
}

pub async fn context() -> (JobContext, Fakes) {
    let fakes = Fakes {
        store: MemoryStore::new(),
        events: MemoryEventSender::new(),
        provisioning: Arc::new(FakeProvisioning::default()),
        deleter: Arc::new(FakeDeleter::default()),
        queue: Arc::new(MemoryQueue::new(1024, OverflowPolicy::Reject)),
    };
    let ctx = JobContext {
        applications: Arc::new(fakes.store.clone()),
        authentications: Arc::new(fakes.store.clone()),
        events: Arc::new(fakes.events.clone()),
        provisioning: fakes.provisioning.clone(),
        deleter: fakes.deleter.clone(),
        queue: fakes.queue.clone(),
        retry: RetryConfig::default(),
    };
    (ctx, fakes)
}

#[derive(Debug, Default)]
pub struct FakeProvisioning {
    calls: Mutex<Vec<ResourceRef>>,
    failing: Mutex<Vec<i64>>,
}

impl FakeProvisioning {
    pub fn calls(&self) -> Vec<ResourceRef> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_for(&self, id: i64) {
        self.failing.lock().unwrap().push(id);
    }
}

#[async_trait]
impl ProvisioningClient for FakeProvisioning {
    async fn send_delete_request(
        &self,
        _identity: &str,
        resource: &ResourceRef,
        _headers: &[ForwardableHeader],
    ) -> AppResult<()> {
        self.calls.lock().unwrap().push(*resource);
        if self.failing.lock().unwrap().contains(&resource.id) {
            return Err(AppError::external_service("provisioning backend returned 500"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeDeleter {
    calls: Mutex<Vec<(ResourceRef, Vec<ForwardableHeader>)>>,
    failure: Mutex<Option<AppError>>,
}

impl FakeDeleter {
    pub fn calls(&self) -> Vec<(ResourceRef, Vec<ForwardableHeader>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self) {
        self.fail_with(AppError::database("cascade delete failed"));
    }

    pub fn fail_with(&self, error: AppError) {
        *self.failure.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl ResourceDeleter for FakeDeleter {
    async fn delete_cascade(
        &self,
        resource: &ResourceRef,
        headers: &[ForwardableHeader],
    ) -> AppResult<()> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.calls
            .lock()
            .unwrap()
            .push((*resource, headers.to_vec()));
        Ok(())
    }
}

/// Counters shared between a [`RecordingJob`] and the test.
#[derive(Debug, Default)]
pub struct Runs {
    finished: AtomicUsize,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl Runs {
    pub fn count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Highest number of copies observed running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Job that records its runs and optionally sleeps or fails.
#[derive(Debug, Clone)]
pub struct RecordingJob {
    delay: Duration,
    work: Duration,
    fails: bool,
    runs: Arc<Runs>,
}

impl RecordingJob {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            work: Duration::ZERO,
            fails: false,
            runs: Arc::new(Runs::default()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fails: true,
            ..Self::new(Duration::ZERO)
        }
    }

    /// Sleep for `work` while running.
    pub fn working_for(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub fn runs(&self) -> Arc<Runs> {
        Arc::clone(&self.runs)
    }
}

#[async_trait]
impl Job for RecordingJob {
    fn name(&self) -> &'static str {
        "RecordingJob"
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn arguments(&self) -> Map<String, Value> {
        let mut args = Map::new();
        args.insert("delay_ms".into(), json!(self.delay.as_millis() as u64));
        args
    }

    async fn run(&self, _ctx: &JobContext) -> Result<(), JobExecutionError> {
        let running = self.runs.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.runs.peak.fetch_max(running, Ordering::SeqCst);
        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        self.runs.running.fetch_sub(1, Ordering::SeqCst);
        self.runs.finished.fetch_add(1, Ordering::SeqCst);

        if self.fails {
            return Err(JobExecutionError::Transient("recording job failed".into()));
        }
        Ok(())
    }

    fn to_payload(&self) -> AppResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.arguments())?)
    }
}
