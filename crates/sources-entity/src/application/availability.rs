//! Availability status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Health state of a resource, written by the external availability checkers.
///
/// The column is nullable and may also hold an empty string; both mean the
/// resource has never been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    /// Reachable and working.
    Available,
    /// A check is currently running.
    InProgress,
    /// Some, but not all, sub-resources are reachable.
    PartiallyAvailable,
    /// Not reachable.
    Unavailable,
}

impl AvailabilityStatus {
    /// Return the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InProgress => "in_progress",
            Self::PartiallyAvailable => "partially_available",
            Self::Unavailable => "unavailable",
        }
    }

    /// Parse a raw column value. Unknown, empty, and NULL values yield `None`.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw? {
            "available" => Some(Self::Available),
            "in_progress" => Some(Self::InProgress),
            "partially_available" => Some(Self::PartiallyAvailable),
            "unavailable" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
