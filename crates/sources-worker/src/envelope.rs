//! Name-tagged job envelope for the durable queue and the registry that
//! turns envelopes back into jobs.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use sources_core::result::AppResult;

use crate::executor::JobExecutionError;
use crate::job::Job;
use crate::jobs::{AsyncDestroyJob, SuperkeyDestroyJob};

/// Wire form of a queued job: `{"JobName": "...", "JobRaw": "<base64 JSON>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    /// Registry name of the job.
    #[serde(rename = "JobName")]
    pub job_name: String,
    /// The job's own JSON payload.
    #[serde(rename = "JobRaw", with = "base64_bytes")]
    pub job_raw: Vec<u8>,
}

impl DispatchEnvelope {
    /// Wrap a job.
    pub fn wrap(job: &dyn Job) -> AppResult<Self> {
        Ok(Self {
            job_name: job.name().to_string(),
            job_raw: job.to_payload()?,
        })
    }

    /// Encode as JSON bytes.
    pub fn encode(&self) -> AppResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode JSON bytes. A malformed message can never be processed.
    pub fn decode(bytes: &[u8]) -> Result<Self, JobExecutionError> {
        serde_json::from_slice(bytes).map_err(|e| {
            JobExecutionError::Permanent(format!("malformed job envelope: {e}"))
        })
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Rebuilds a job from its payload.
pub type JobFactory = fn(&[u8]) -> AppResult<Arc<dyn Job>>;

/// Maps job names to factories.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    factories: HashMap<&'static str, JobFactory>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every job that travels through the durable queue.
    pub fn with_builtin_jobs() -> Self {
        let mut registry = Self::new();
        registry.register(SuperkeyDestroyJob::NAME, |payload| {
            let job: Arc<dyn Job> = Arc::new(SuperkeyDestroyJob::from_payload(payload)?);
            Ok(job)
        });
        registry.register(AsyncDestroyJob::NAME, |payload| {
            let job: Arc<dyn Job> = Arc::new(AsyncDestroyJob::from_payload(payload)?);
            Ok(job)
        });
        registry
    }

    /// Register a factory. A later registration under the same name wins.
    pub fn register(&mut self, name: &'static str, factory: JobFactory) {
        tracing::debug!("Registered job factory for '{}'", name);
        self.factories.insert(name, factory);
    }

    /// Registered job names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Rebuild the job carried by an envelope.
    pub fn decode(&self, envelope: &DispatchEnvelope) -> Result<Arc<dyn Job>, JobExecutionError> {
        let factory = self.factories.get(envelope.job_name.as_str()).ok_or_else(|| {
            JobExecutionError::Permanent(format!("unknown job name '{}'", envelope.job_name))
        })?;
        factory(&envelope.job_raw).map_err(|e| {
            JobExecutionError::Permanent(format!(
                "invalid payload for job '{}': {e}",
                envelope.job_name
            ))
        })
    }

    /// Decode raw queue bytes into a job.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Arc<dyn Job>, JobExecutionError> {
        self.decode(&DispatchEnvelope::decode(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sources_core::types::{ForwardableHeader, ResourceKind};

    fn round_trip(job: &dyn Job) -> Arc<dyn Job> {
        let bytes = DispatchEnvelope::wrap(job).unwrap().encode().unwrap();
        JobRegistry::with_builtin_jobs().decode_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_superkey_destroy_survives_the_queue() {
        let job = SuperkeyDestroyJob::new(
            3,
            ResourceKind::Source,
            42,
            "aWQ=",
            vec![ForwardableHeader::new("x-rh-sources-org-id", "o")],
        );
        let decoded = round_trip(&job);

        assert_eq!(decoded.name(), SuperkeyDestroyJob::NAME);
        assert_eq!(decoded.to_payload().unwrap(), job.to_payload().unwrap());
        assert_eq!(decoded.arguments(), job.arguments());
    }

    #[test]
    fn test_async_destroy_survives_the_queue() {
        let job = AsyncDestroyJob::new(3, ResourceKind::Application, 7, 15, vec![]);
        let decoded = round_trip(&job);

        assert_eq!(decoded.name(), AsyncDestroyJob::NAME);
        assert_eq!(decoded.delay(), std::time::Duration::from_secs(15));
        assert_eq!(decoded.to_payload().unwrap(), job.to_payload().unwrap());
    }

    #[test]
    fn test_unknown_name_is_permanent() {
        let envelope = DispatchEnvelope {
            job_name: "NoSuchJob".to_string(),
            job_raw: b"{}".to_vec(),
        };
        let err = JobRegistry::with_builtin_jobs().decode(&envelope).unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(_)));
    }

    #[test]
    fn test_legacy_wire_format_is_accepted() {
        let raw = br#"{"headers":[],"tenant":1,"wait_seconds":15,"model":"source","id":9}"#;
        let wire = serde_json::json!({
            "JobName": "AsyncDestroyJob",
            "JobRaw": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, raw),
            "Extra": true,
        });

        let job = JobRegistry::with_builtin_jobs()
            .decode_bytes(wire.to_string().as_bytes())
            .unwrap();
        assert_eq!(job.arguments()["id"], 9);
    }

    #[test]
    fn test_malformed_payload_is_permanent() {
        let envelope = DispatchEnvelope {
            job_name: AsyncDestroyJob::NAME.to_string(),
            job_raw: b"not json".to_vec(),
        };
        let err = JobRegistry::with_builtin_jobs().decode(&envelope).unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(_)));
    }

    #[test]
    fn test_retry_create_is_not_registered() {
        let registry = JobRegistry::with_builtin_jobs();
        assert_eq!(
            registry.names(),
            vec![AsyncDestroyJob::NAME, SuperkeyDestroyJob::NAME]
        );

        let envelope = DispatchEnvelope {
            job_name: crate::jobs::RetryCreateJob::NAME.to_string(),
            job_raw: b"{}".to_vec(),
        };
        let err = registry.decode(&envelope).unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(_)));
    }
}
