use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// The full persisted ledger: `{ "codes": [ ... ] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default)]
    pub codes: Vec<RedemptionCode>,
}

impl LedgerDocument {
    pub fn find(&self, code: &str) -> Option<&RedemptionCode> {
        self.codes.iter().find(|c| c.code == code)
    }

    pub fn find_mut(&mut self, code: &str) -> Option<&mut RedemptionCode> {
        self.codes.iter_mut().find(|c| c.code == code)
    }
}

/// A single redemption code as stored in the ledger file.
///
/// Fields not known to this service are kept in `extra` and written back
/// untouched, so provisioning tools can attach their own metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionCode {
    pub code: String,

    #[serde(default)]
    pub used: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,

    /// Asset the code was redeemed for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl RedemptionCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            used: false,
            used_at: None,
            asset: None,
            extra: Map::new(),
        }
    }

    /// Marks the code as consumed. Only called on a code that is not yet used.
    pub(crate) fn mark_used(&mut self, asset_id: &str, at: DateTime<Utc>) {
        debug_assert!(!self.used, "code {} redeemed twice", self.code);
        self.used = true;
        self.used_at = Some(at);
        self.asset = Some(asset_id.to_string());
    }
}
