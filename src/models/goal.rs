use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::record::SyncRecord;

/// A shared savings goal the household is working toward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub name: String,
    pub target_cents: i64,
    pub saved_cents: i64,
    pub target_date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    pub fn new(
        name: impl Into<String>,
        target_cents: i64,
        created_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            target_cents,
            saved_cents: 0,
            target_date: None,
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_target_date(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    /// Adds to the saved amount and marks the goal as modified.
    pub fn add_savings(&mut self, amount_cents: i64) {
        self.saved_cents += amount_cents;
        self.updated_at = Utc::now();
    }

    /// Progress toward the target, clamped to 0..=100.
    pub fn percent_complete(&self) -> u8 {
        if self.target_cents <= 0 {
            return 100;
        }
        let pct = self.saved_cents * 100 / self.target_cents;
        pct.clamp(0, 100) as u8
    }

    pub fn to_record(&self) -> Result<SyncRecord, serde_json::Error> {
        SyncRecord::from_model(self)
    }

    pub fn from_record(record: &SyncRecord) -> Result<Self, serde_json::Error> {
        record.into_model()
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:>10.2} / {:>10.2} ({}%)",
            self.name,
            self.saved_cents as f64 / 100.0,
            self.target_cents as f64 / 100.0,
            self.percent_complete()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_new() {
        let goal = Goal::new("summer trip", 250_000, "ada");

        assert_eq!(goal.name, "summer trip");
        assert_eq!(goal.target_cents, 250_000);
        assert_eq!(goal.saved_cents, 0);
        assert!(goal.target_date.is_none());
    }

    #[test]
    fn test_goal_add_savings() {
        let mut goal = Goal::new("summer trip", 250_000, "ada");
        goal.add_savings(50_000);
        goal.add_savings(75_000);

        assert_eq!(goal.saved_cents, 125_000);
        assert_eq!(goal.percent_complete(), 50);
    }

    #[test]
    fn test_goal_percent_clamped() {
        let mut goal = Goal::new("small", 100, "ada");
        goal.add_savings(500);
        assert_eq!(goal.percent_complete(), 100);
    }

    #[test]
    fn test_goal_record_roundtrip() {
        let goal = Goal::new("summer trip", 250_000, "ada")
            .with_target_date(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap());

        let record = goal.to_record().unwrap();
        let back = Goal::from_record(&record).unwrap();

        assert_eq!(back.id, goal.id);
        assert_eq!(back.target_date, goal.target_date);
    }

    #[test]
    fn test_goal_display() {
        let goal = Goal::new("summer trip", 250_000, "ada");
        let output = format!("{}", goal);
        assert!(output.contains("summer trip"));
        assert!(output.contains("0%"));
    }
}
