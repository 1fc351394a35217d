//! Provisioning backend configuration.

use serde::{Deserialize, Serialize};

/// Connection settings for the Superkey provisioning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuperkeyConfig {
    /// Base URL of the provisioning backend.
    #[serde(default = "default_url")]
    pub url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for SuperkeyConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_request_timeout() -> u64 {
    30
}
