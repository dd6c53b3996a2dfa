use chrono::{Local, NaiveDate};
use clap::{Args, Subcommand, ValueEnum};
use serde_json::json;
use uuid::Uuid;

use hearthbook::config::Config;
use hearthbook::models::{Collection, Transaction};
use hearthbook::sync::LocalStore;

use super::{try_auto_sync, Orchestrator};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct TransactionCommand {
    #[command(subcommand)]
    pub command: TransactionSubcommand,
}

#[derive(Subcommand)]
pub enum TransactionSubcommand {
    /// Record an expense (positive amount) or income (negative amount)
    Add {
        /// Amount in currency units, e.g. 12.50
        amount: f64,

        /// Category, e.g. groceries
        category: String,

        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Who was paid
        #[arg(long)]
        payee: Option<String>,

        /// Free-form note
        #[arg(long)]
        note: Option<String>,
    },

    /// List transactions, newest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Remove a transaction
    Remove {
        /// Transaction ID (UUID)
        id: String,
    },
}

impl TransactionCommand {
    pub async fn run(
        &self,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            TransactionSubcommand::Add {
                amount,
                category,
                date,
                payee,
                note,
            } => {
                self.add(amount, category, date, payee, note, orchestrator, config)
                    .await
            }
            TransactionSubcommand::List { format } => self.list(format, orchestrator).await,
            TransactionSubcommand::Remove { id } => self.remove(id, orchestrator, config).await,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn add(
        &self,
        amount: &f64,
        category: &str,
        date: &Option<String>,
        payee: &Option<String>,
        note: &Option<String>,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let date = match date {
            Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| format!("Invalid date (expected YYYY-MM-DD): {}", d))?,
            None => Local::now().date_naive(),
        };
        let amount_cents = (amount * 100.0).round() as i64;

        let mut tx = Transaction::new(date, amount_cents, category, &config.member.value);
        if let Some(payee) = payee {
            tx = tx.with_payee(payee);
        }
        if let Some(note) = note {
            tx = tx.with_note(note);
        }

        let record = tx.to_record()?;
        orchestrator
            .store()
            .save(Collection::Transactions, &record)
            .await?;
        orchestrator
            .queue_operation(json!({
                "op": "upsert",
                "collection": Collection::Transactions.as_str(),
                "record_id": record.id,
            }))
            .await?;

        println!("Recorded: {}", tx);
        println!("  id: {}", tx.id);

        try_auto_sync(orchestrator, config).await;
        Ok(())
    }

    async fn list(
        &self,
        format: &OutputFormat,
        orchestrator: &Orchestrator,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let records = orchestrator
            .store()
            .get_all(Collection::Transactions)
            .await?;

        let mut transactions = Vec::with_capacity(records.len());
        for record in &records {
            transactions.push(Transaction::from_record(record)?);
        }
        transactions.sort_by(|a, b| b.date.cmp(&a.date));

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&transactions)?);
            }
            OutputFormat::Text => {
                if transactions.is_empty() {
                    println!("No transactions recorded.");
                    return Ok(());
                }
                for tx in &transactions {
                    println!("{}", tx);
                }
                let total: i64 = transactions.iter().map(|t| t.amount_cents).sum();
                println!();
                println!(
                    "{} transaction(s), net {:.2}",
                    transactions.len(),
                    total as f64 / 100.0
                );
            }
        }
        Ok(())
    }

    async fn remove(
        &self,
        id: &str,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let uuid = Uuid::parse_str(id).map_err(|_| format!("Invalid transaction UUID: {}", id))?;

        orchestrator
            .store()
            .delete(Collection::Transactions, &uuid.to_string())
            .await?;
        orchestrator
            .queue_operation(json!({
                "op": "delete",
                "collection": Collection::Transactions.as_str(),
                "record_id": uuid,
            }))
            .await?;

        println!("Removed transaction {}", uuid);

        try_auto_sync(orchestrator, config).await;
        Ok(())
    }
}
