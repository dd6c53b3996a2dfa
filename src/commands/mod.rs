pub mod budget;
pub mod config_cmd;
pub mod goal;
pub mod sync_cmd;
pub mod transaction;

pub use budget::BudgetCommand;
pub use config_cmd::ConfigCommand;
pub use goal::GoalCommand;
pub use sync_cmd::SyncCommand;
pub use transaction::TransactionCommand;

use hearthbook::config::Config;
use hearthbook::crypto::SecretBox;
use hearthbook::db::{init_db, RecordRepository};
use hearthbook::sync::{Remote, SyncOrchestrator, SyncSetup};
use hearthbook::transport::HttpTransport;

/// The orchestrator as the CLI wires it: SQLite store, HTTP remote.
pub type Orchestrator = SyncOrchestrator<RecordRepository, HttpTransport>;

/// Builds the orchestrator from config: database pool, engine files in the
/// data directory, and the remote when one is configured.
pub async fn build_orchestrator(
    config: &Config,
) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let pool = init_db(&config.database_path()).await?;
    let store = RecordRepository::new(pool);

    let remote = config.sync.remote_url.as_ref().map(|url| {
        Remote::new(
            HttpTransport::new(url.clone(), config.sync.api_key.clone()),
            config.sync.shared_secret.as_deref().map(SecretBox::new),
        )
    });

    let orchestrator = SyncOrchestrator::new(
        SyncSetup {
            actor_id: config.member.value.clone(),
            group_id: config.household.value.clone(),
            remote_doc_id: config.sync.remote_doc_id.clone(),
            data_dir: config.data_dir.value.clone(),
            strategy: config.sync.strategy,
            interval: config.sync.interval(),
        },
        store,
        remote,
    )?;

    Ok(orchestrator)
}

/// Performs a best-effort sync after a write when `auto_sync` is enabled.
///
/// Errors are reported but never fail the command; the CLI keeps working
/// offline when the remote is unavailable.
pub async fn try_auto_sync(orchestrator: &mut Orchestrator, config: &Config) {
    if !config.sync.auto_sync || !config.sync.is_configured() {
        return;
    }
    if let Err(e) = orchestrator.sync_now().await {
        eprintln!("Auto-sync: {}", e);
    }
}
