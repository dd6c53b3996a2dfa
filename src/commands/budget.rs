use chrono::Local;
use clap::{Args, Subcommand, ValueEnum};
use serde_json::json;

use hearthbook::config::Config;
use hearthbook::models::{Budget, Collection};
use hearthbook::sync::LocalStore;

use super::{try_auto_sync, Orchestrator};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct BudgetCommand {
    #[command(subcommand)]
    pub command: BudgetSubcommand,
}

#[derive(Subcommand)]
pub enum BudgetSubcommand {
    /// Set the monthly limit for a category (creates or updates)
    Set {
        /// Category, e.g. groceries
        category: String,

        /// Limit in currency units, e.g. 400
        limit: f64,

        /// Budget month (YYYY-MM), defaults to the current month
        #[arg(long, short)]
        month: Option<String>,

        /// Free-form note
        #[arg(long)]
        note: Option<String>,
    },

    /// List budgets
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl BudgetCommand {
    pub async fn run(
        &self,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            BudgetSubcommand::Set {
                category,
                limit,
                month,
                note,
            } => self.set(category, limit, month, note, orchestrator, config).await,
            BudgetSubcommand::List { format } => self.list(format, orchestrator).await,
        }
    }

    async fn set(
        &self,
        category: &str,
        limit: &f64,
        month: &Option<String>,
        note: &Option<String>,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let month = match month {
            Some(m) => m.clone(),
            None => Local::now().format("%Y-%m").to_string(),
        };
        let limit_cents = (limit * 100.0).round() as i64;

        // Update the existing budget for this month/category if there is
        // one, otherwise create it.
        let records = orchestrator.store().get_all(Collection::Budgets).await?;
        let mut budget = None;
        for record in &records {
            let existing = Budget::from_record(record)?;
            if existing.month == month && existing.category == category {
                budget = Some(existing);
                break;
            }
        }

        let budget = match budget {
            Some(mut existing) => {
                existing.set_limit(limit_cents);
                existing
            }
            None => {
                let mut created =
                    Budget::new(&month, category, limit_cents, &config.member.value);
                if let Some(note) = note {
                    created = created.with_note(note);
                }
                created
            }
        };

        let record = budget.to_record()?;
        orchestrator
            .store()
            .save(Collection::Budgets, &record)
            .await?;
        orchestrator
            .queue_operation(json!({
                "op": "upsert",
                "collection": Collection::Budgets.as_str(),
                "record_id": record.id,
            }))
            .await?;

        println!("Budget set: {}", budget);

        try_auto_sync(orchestrator, config).await;
        Ok(())
    }

    async fn list(
        &self,
        format: &OutputFormat,
        orchestrator: &Orchestrator,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let records = orchestrator.store().get_all(Collection::Budgets).await?;

        let mut budgets = Vec::with_capacity(records.len());
        for record in &records {
            budgets.push(Budget::from_record(record)?);
        }
        budgets.sort_by(|a, b| b.month.cmp(&a.month).then(a.category.cmp(&b.category)));

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&budgets)?);
            }
            OutputFormat::Text => {
                if budgets.is_empty() {
                    println!("No budgets set.");
                    return Ok(());
                }
                for budget in &budgets {
                    println!("{}", budget);
                }
            }
        }
        Ok(())
    }
}
