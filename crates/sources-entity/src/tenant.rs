//! Tenant entity model and forwardable header generation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;

use sources_core::types::ForwardableHeader;
use sources_core::types::headers::{ACCOUNT_NUMBER_HEADER, IDENTITY_HEADER, ORG_ID_HEADER};

/// Isolation boundary every persisted resource belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    /// Primary key.
    pub id: i64,
    /// Legacy account number.
    pub external_tenant: Option<String>,
    /// Organization id.
    pub org_id: Option<String>,
}

impl Tenant {
    /// Headers to forward with events raised on behalf of this tenant when
    /// no request is around to copy them from.
    ///
    /// The account number and org id headers are only present when the tenant
    /// has the value; the identity header is always generated from both.
    pub fn forwardable_headers(&self) -> Vec<ForwardableHeader> {
        let account_number = non_empty(self.external_tenant.as_deref());
        let org_id = non_empty(self.org_id.as_deref());

        let mut headers = Vec::with_capacity(3);
        if let Some(account) = account_number {
            headers.push(ForwardableHeader::new(ACCOUNT_NUMBER_HEADER, account));
        }
        if let Some(org) = org_id {
            headers.push(ForwardableHeader::new(ORG_ID_HEADER, org));
        }
        headers.push(ForwardableHeader::new(
            IDENTITY_HEADER,
            generate_identity(account_number, org_id),
        ));
        headers
    }
}

/// Build a base64-encoded identity document for the given tenant ids.
pub fn generate_identity(account_number: Option<&str>, org_id: Option<&str>) -> String {
    let document = json!({
        "identity": {
            "account_number": account_number.unwrap_or_default(),
            "org_id": org_id.unwrap_or_default(),
            "internal": {
                "org_id": org_id.unwrap_or_default(),
            },
        }
    });
    STANDARD.encode(document.to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
