//! Resource kinds targeted by the destroy workflow.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Kind of resource a destroy job operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A top-level source.
    Source,
    /// An application attached to a source.
    Application,
}

impl ResourceKind {
    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Application => "application",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "application" => Ok(Self::Application),
            other => Err(AppError::validation(format!(
                "unsupported resource kind: '{other}'"
            ))),
        }
    }
}

/// A tenant-scoped reference to a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Owning tenant.
    pub tenant_id: i64,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource primary key.
    pub id: i64,
}

impl ResourceRef {
    /// Reference an application.
    pub fn application(tenant_id: i64, id: i64) -> Self {
        Self {
            tenant_id,
            kind: ResourceKind::Application,
            id,
        }
    }

    /// Reference a source.
    pub fn source(tenant_id: i64, id: i64) -> Self {
        Self {
            tenant_id,
            kind: ResourceKind::Source,
            id,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (tenant {})", self.kind, self.id, self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Source".parse::<ResourceKind>().unwrap(), ResourceKind::Source);
        assert_eq!(
            "APPLICATION".parse::<ResourceKind>().unwrap(),
            ResourceKind::Application
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "endpoint".parse::<ResourceKind>().unwrap_err();
        assert!(err.message.contains("endpoint"));
    }
}
