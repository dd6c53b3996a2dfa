use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};
use serde_json::json;
use uuid::Uuid;

use hearthbook::config::Config;
use hearthbook::models::{Collection, Goal};
use hearthbook::sync::LocalStore;

use super::{try_auto_sync, Orchestrator};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct GoalCommand {
    #[command(subcommand)]
    pub command: GoalSubcommand,
}

#[derive(Subcommand)]
pub enum GoalSubcommand {
    /// Create a savings goal
    Add {
        /// Goal name, e.g. "summer trip"
        name: String,

        /// Target amount in currency units
        target: f64,

        /// Target date (YYYY-MM-DD)
        #[arg(long, short)]
        date: Option<String>,
    },

    /// Add savings toward a goal
    Contribute {
        /// Goal ID (UUID)
        id: String,

        /// Amount in currency units
        amount: f64,
    },

    /// List goals with progress
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl GoalCommand {
    pub async fn run(
        &self,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            GoalSubcommand::Add { name, target, date } => {
                self.add(name, target, date, orchestrator, config).await
            }
            GoalSubcommand::Contribute { id, amount } => {
                self.contribute(id, amount, orchestrator, config).await
            }
            GoalSubcommand::List { format } => self.list(format, orchestrator).await,
        }
    }

    async fn add(
        &self,
        name: &str,
        target: &f64,
        date: &Option<String>,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let target_cents = (target * 100.0).round() as i64;
        let mut goal = Goal::new(name, target_cents, &config.member.value);
        if let Some(d) = date {
            let parsed = NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| format!("Invalid date (expected YYYY-MM-DD): {}", d))?;
            goal = goal.with_target_date(parsed);
        }

        let record = goal.to_record()?;
        orchestrator.store().save(Collection::Goals, &record).await?;
        orchestrator
            .queue_operation(json!({
                "op": "upsert",
                "collection": Collection::Goals.as_str(),
                "record_id": record.id,
            }))
            .await?;

        println!("Created goal: {}", goal);
        println!("  id: {}", goal.id);

        try_auto_sync(orchestrator, config).await;
        Ok(())
    }

    async fn contribute(
        &self,
        id: &str,
        amount: &f64,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let uuid = Uuid::parse_str(id).map_err(|_| format!("Invalid goal UUID: {}", id))?;

        let records = orchestrator.store().get_all(Collection::Goals).await?;
        let record = records
            .iter()
            .find(|r| r.id == uuid.to_string())
            .ok_or_else(|| format!("Goal not found: {}", id))?;

        let mut goal = Goal::from_record(record)?;
        goal.add_savings((amount * 100.0).round() as i64);

        let record = goal.to_record()?;
        orchestrator.store().save(Collection::Goals, &record).await?;
        orchestrator
            .queue_operation(json!({
                "op": "upsert",
                "collection": Collection::Goals.as_str(),
                "record_id": record.id,
            }))
            .await?;

        println!("Updated goal: {}", goal);

        try_auto_sync(orchestrator, config).await;
        Ok(())
    }

    async fn list(
        &self,
        format: &OutputFormat,
        orchestrator: &Orchestrator,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let records = orchestrator.store().get_all(Collection::Goals).await?;

        let mut goals = Vec::with_capacity(records.len());
        for record in &records {
            goals.push(Goal::from_record(record)?);
        }
        goals.sort_by(|a, b| a.name.cmp(&b.name));

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&goals)?);
            }
            OutputFormat::Text => {
                if goals.is_empty() {
                    println!("No goals yet.");
                    return Ok(());
                }
                for goal in &goals {
                    println!("{}", goal);
                }
            }
        }
        Ok(())
    }
}
