//! Reconciliation job configuration.

use serde::{Deserialize, Serialize};

/// Settings for the periodic `RetryCreateJob` sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Whether the sweep is scheduled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds slept between two sweeps.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Retry counter ceiling; rows at the ceiling are never selected.
    #[serde(default = "default_retry_max")]
    pub retry_max: i32,
    /// Only applications created within this many minutes are retried.
    #[serde(default = "default_record_age_limit")]
    pub record_age_limit_minutes: i64,
    /// Maximum number of candidates resent concurrently.
    #[serde(default = "default_resend_concurrency")]
    pub resend_concurrency: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_seconds: default_interval(),
            retry_max: default_retry_max(),
            record_age_limit_minutes: default_record_age_limit(),
            resend_concurrency: default_resend_concurrency(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    120
}

fn default_retry_max() -> i32 {
    5
}

fn default_record_age_limit() -> i64 {
    30
}

fn default_resend_concurrency() -> usize {
    16
}
