//! Schema-free record envelope used by the sync engine.
//!
//! The engine never looks inside domain fields: a [`SyncRecord`] carries the
//! identity and modification timestamps it needs for merging, and everything
//! else rides along opaquely in a flattened JSON map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collections synchronized between household devices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Transactions,
    Budgets,
    Goals,
}

impl Collection {
    /// All synchronized collections, in merge order.
    pub const ALL: [Collection; 3] = [
        Collection::Transactions,
        Collection::Budgets,
        Collection::Goals,
    ];

    /// Returns the collection name used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Transactions => "transactions",
            Collection::Budgets => "budgets",
            Collection::Goals => "goals",
        }
    }

    /// Parse from string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "transactions" => Some(Collection::Transactions),
            "budgets" => Some(Collection::Budgets),
            "goals" => Some(Collection::Goals),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A synchronized record as the engine sees it.
///
/// `id` is stable and globally unique, assigned at creation and never
/// reused. Within one collection, `id` is unique. Domain fields are opaque
/// to the engine and preserved verbatim through merges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl SyncRecord {
    /// The timestamp used for last-write-wins comparison:
    /// `updated_at`, falling back to `created_at`, falling back to the epoch.
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.updated_at
            .or(self.created_at)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Convert a domain model into its sync envelope.
    pub fn from_model<T: Serialize>(model: &T) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(model)?)
    }

    /// Convert the envelope back into a domain model.
    pub fn into_model<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_as_str() {
        assert_eq!(Collection::Transactions.as_str(), "transactions");
        assert_eq!(Collection::Budgets.as_str(), "budgets");
        assert_eq!(Collection::Goals.as_str(), "goals");
    }

    #[test]
    fn test_collection_parse() {
        assert_eq!(Collection::parse("transactions"), Some(Collection::Transactions));
        assert_eq!(Collection::parse("BUDGETS"), Some(Collection::Budgets));
        assert_eq!(Collection::parse("goals"), Some(Collection::Goals));
        assert_eq!(Collection::parse("invalid"), None);
    }

    #[test]
    fn test_record_preserves_unknown_fields() {
        let value = json!({
            "id": "t1",
            "updated_at": "2026-01-05T10:00:00Z",
            "amount_cents": 1250,
            "payee": "bakery"
        });

        let record: SyncRecord = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(record.id, "t1");
        assert_eq!(record.fields["amount_cents"], json!(1250));
        assert_eq!(record.fields["payee"], json!("bakery"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_modified_at_prefers_updated_at() {
        let record: SyncRecord = serde_json::from_value(json!({
            "id": "t1",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-05T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.modified_at(), record.updated_at.unwrap());
    }

    #[test]
    fn test_modified_at_falls_back_to_created_at() {
        let record: SyncRecord = serde_json::from_value(json!({
            "id": "t1",
            "created_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(record.modified_at(), record.created_at.unwrap());
    }

    #[test]
    fn test_modified_at_epoch_when_untimestamped() {
        let record: SyncRecord = serde_json::from_value(json!({ "id": "t1" })).unwrap();
        assert_eq!(record.modified_at(), DateTime::UNIX_EPOCH);
    }
}
