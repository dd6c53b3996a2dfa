use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{BudgetCommand, ConfigCommand, GoalCommand, SyncCommand, TransactionCommand};
use hearthbook::config::Config;

#[derive(Parser)]
#[command(name = "hearth")]
#[command(version)]
#[command(about = "Local-first household ledger with multi-device sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record and list transactions
    Tx(TransactionCommand),

    /// Manage monthly budgets
    Budget(BudgetCommand),

    /// Manage savings goals
    Goal(GoalCommand),

    /// Synchronize with the household share
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hearthbook=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Tx(cmd)) => {
            let mut orchestrator = commands::build_orchestrator(&config).await?;
            cmd.run(&mut orchestrator, &config).await?;
        }
        Some(Commands::Budget(cmd)) => {
            let mut orchestrator = commands::build_orchestrator(&config).await?;
            cmd.run(&mut orchestrator, &config).await?;
        }
        Some(Commands::Goal(cmd)) => {
            let mut orchestrator = commands::build_orchestrator(&config).await?;
            cmd.run(&mut orchestrator, &config).await?;
        }
        Some(Commands::Sync(cmd)) => {
            let mut orchestrator = commands::build_orchestrator(&config).await?;
            cmd.run(&mut orchestrator, &config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
