//! Headers forwarded along with jobs and raised events.

use serde::{Deserialize, Serialize};

/// Identity header carrying the base64-encoded identity document.
pub const IDENTITY_HEADER: &str = "x-rh-identity";
/// Header carrying the tenant's account number.
pub const ACCOUNT_NUMBER_HEADER: &str = "x-rh-sources-account-number";
/// Header carrying the tenant's organization id.
pub const ORG_ID_HEADER: &str = "x-rh-sources-org-id";
/// Header naming the event type on every raised event.
pub const EVENT_TYPE_HEADER: &str = "event_type";

/// A single key/value header that travels with a job or an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardableHeader {
    /// Header name.
    pub key: String,
    /// Header value.
    pub value: String,
}

impl ForwardableHeader {
    /// Create a new header.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Look up the value of the first header named `key`.
pub fn find<'a>(headers: &'a [ForwardableHeader], key: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.key.eq_ignore_ascii_case(key))
        .map(|h| h.value.as_str())
}
