use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::record::SyncRecord;

/// A single household expense or income entry.
///
/// Amounts are stored in cents; negative values are income.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub category: String,
    pub payee: Option<String>,
    pub note: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        amount_cents: i64,
        category: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            date,
            amount_cents,
            category: category.into(),
            payee: None,
            note: None,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = Some(payee.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Marks the transaction as modified now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn to_record(&self) -> Result<SyncRecord, serde_json::Error> {
        SyncRecord::from_model(self)
    }

    pub fn from_record(record: &SyncRecord) -> Result<Self, serde_json::Error> {
        record.into_model()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let euros = self.amount_cents as f64 / 100.0;
        write!(f, "{}  {:>10.2}  {}", self.date, euros, self.category)?;
        if let Some(payee) = &self.payee {
            write!(f, "  {}", payee)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn test_transaction_new() {
        let tx = Transaction::new(sample_date(), 1250, "groceries", "ada");

        assert_eq!(tx.date, sample_date());
        assert_eq!(tx.amount_cents, 1250);
        assert_eq!(tx.category, "groceries");
        assert!(tx.payee.is_none());
        assert!(tx.note.is_none());
        assert_eq!(tx.created_by, "ada");
        assert_eq!(tx.created_at, tx.updated_at);
    }

    #[test]
    fn test_transaction_builders() {
        let tx = Transaction::new(sample_date(), 1250, "groceries", "ada")
            .with_payee("corner bakery")
            .with_note("birthday cake");

        assert_eq!(tx.payee, Some("corner bakery".to_string()));
        assert_eq!(tx.note, Some("birthday cake".to_string()));
    }

    #[test]
    fn test_transaction_touch_advances_updated_at() {
        let mut tx = Transaction::new(sample_date(), 1250, "groceries", "ada");
        let before = tx.updated_at;
        tx.touch();
        assert!(tx.updated_at >= before);
    }

    #[test]
    fn test_transaction_record_roundtrip() {
        let tx = Transaction::new(sample_date(), -50_000, "salary", "ada").with_payee("employer");

        let record = tx.to_record().unwrap();
        assert_eq!(record.id, tx.id.to_string());
        assert_eq!(record.updated_at, Some(tx.updated_at));

        let back = Transaction::from_record(&record).unwrap();
        assert_eq!(back.id, tx.id);
        assert_eq!(back.amount_cents, -50_000);
        assert_eq!(back.payee, tx.payee);
    }

    #[test]
    fn test_transaction_display() {
        let tx = Transaction::new(sample_date(), 1250, "groceries", "ada").with_payee("bakery");
        let output = format!("{}", tx);
        assert!(output.contains("2026-01-05"));
        assert!(output.contains("12.50"));
        assert!(output.contains("bakery"));
    }
}
