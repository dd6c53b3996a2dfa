use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::record::SyncRecord;

/// A monthly spending limit for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    /// Budget month in `YYYY-MM` form.
    pub month: String,
    pub category: String,
    pub limit_cents: i64,
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        month: impl Into<String>,
        category: impl Into<String>,
        limit_cents: i64,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            month: month.into(),
            category: category.into(),
            limit_cents,
            note: None,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Replaces the limit and marks the budget as modified.
    pub fn set_limit(&mut self, limit_cents: i64) {
        self.limit_cents = limit_cents;
        self.updated_at = Utc::now();
    }

    pub fn to_record(&self) -> Result<SyncRecord, serde_json::Error> {
        SyncRecord::from_model(self)
    }

    pub fn from_record(record: &SyncRecord) -> Result<Self, serde_json::Error> {
        record.into_model()
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {:<15} {:>10.2}",
            self.month,
            self.category,
            self.limit_cents as f64 / 100.0
        )
    }
}
