//! Superkey provisioning state stored on an application.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sources_core::error::AppError;
use sources_core::result::AppResult;

/// Provisioning state written into `applications.superkey_data` by the
/// Superkey backend after it created the cloud-side resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperkeyData {
    /// Identifier of the provisioning run.
    pub guid: String,
    /// Cloud provider, e.g. `"amazon"`.
    pub provider: String,
    /// Completed steps keyed by step name; the backend needs them to unwind.
    #[serde(default, rename = "steps")]
    pub steps_completed: HashMap<String, HashMap<String, String>>,
}

impl SuperkeyData {
    /// Parse the raw JSON column. `None` or `null` means the application was
    /// never provisioned.
    pub fn parse(raw: Option<&serde_json::Value>) -> AppResult<Option<Self>> {
        let Some(value) = raw else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }

        let guid = value
            .get("guid")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::validation(format!("invalid type for guid: {:?}", value.get("guid")))
            })?;
        let provider = value
            .get("provider")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AppError::validation(format!("invalid type for provider: {:?}", value.get("provider")))
            })?;

        // Malformed steps are tolerated; the backend then unwinds what it can.
        let steps_completed = match value.get("steps") {
            Some(steps) if !steps.is_null() => {
                serde_json::from_value(steps.clone()).unwrap_or_default()
            }
            _ => HashMap::new(),
        };

        Ok(Some(Self {
            guid: guid.to_string(),
            provider: provider.to_string(),
            steps_completed,
        }))
    }
}
