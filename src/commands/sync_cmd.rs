//! Sync CLI commands: run cycles, inspect status, share/join the remote
//! document, and settle conflicts.

use clap::{Args, Subcommand, ValueEnum};
use uuid::Uuid;

use hearthbook::config::Config;
use hearthbook::sync::{SyncPhase, SyncReport, Winner};

use super::Orchestrator;

#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    pub command: Option<SyncSubcommand>,
}

#[derive(Subcommand)]
pub enum SyncSubcommand {
    /// Show sync configuration and engine status
    Status,

    /// Run the periodic sync loop until interrupted
    Watch,

    /// Create the shared remote document and print its id
    Share,

    /// Adopt a remote document created by another family member
    Join {
        /// Remote document id
        doc_id: String,
    },

    /// List or resolve conflicts awaiting manual review
    Conflicts {
        #[command(subcommand)]
        command: Option<ConflictsSubcommand>,
    },
}

#[derive(Subcommand)]
pub enum ConflictsSubcommand {
    /// Keep one side of a logged conflict
    Resolve {
        /// Conflict ID (UUID)
        id: String,

        /// Which version to keep
        #[arg(value_enum)]
        keep: KeepSide,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KeepSide {
    Local,
    Remote,
}

impl From<KeepSide> for Winner {
    fn from(side: KeepSide) -> Self {
        match side {
            KeepSide::Local => Winner::Local,
            KeepSide::Remote => Winner::Remote,
        }
    }
}

impl SyncCommand {
    pub async fn run(
        &self,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None => self.sync_once(orchestrator, config).await,
            Some(SyncSubcommand::Status) => self.status(orchestrator, config),
            Some(SyncSubcommand::Watch) => self.watch(orchestrator, config).await,
            Some(SyncSubcommand::Share) => self.share(orchestrator, config).await,
            Some(SyncSubcommand::Join { doc_id }) => {
                self.join(doc_id, orchestrator, config).await
            }
            Some(SyncSubcommand::Conflicts { command }) => match command {
                None => self.list_conflicts(orchestrator),
                Some(ConflictsSubcommand::Resolve { id, keep }) => {
                    self.resolve_conflict(id, *keep, orchestrator).await
                }
            },
        }
    }

    async fn sync_once(
        &self,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !config.sync.is_configured() {
            print_not_configured();
            return Ok(());
        }

        println!("Syncing with household share...");
        let report = orchestrator.sync_now().await?;
        print_report(&report);
        Ok(())
    }

    fn status(
        &self,
        orchestrator: &Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        if !config.sync.is_configured() {
            print_not_configured();
            return Ok(());
        }

        let remote_url = config.sync.remote_url.as_deref().unwrap_or("-");
        println!("Remote:     {}", remote_url);
        println!(
            "Document:   {}",
            orchestrator.remote_doc_id().unwrap_or("(not created yet)")
        );
        println!("Member:     {}", orchestrator.actor_id());
        println!("Household:  {}", orchestrator.group_id());
        println!(
            "Encryption: {}",
            if config.sync.shared_secret.is_some() {
                "shared secret"
            } else {
                "none (plaintext)"
            }
        );
        println!(
            "Auto-sync:  {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!("Interval:   {}s", config.sync.interval_secs);
        println!();

        let status = orchestrator.status();
        let phase = match status.phase {
            SyncPhase::Idle => "idle",
            SyncPhase::Syncing => "syncing",
            SyncPhase::Error => "error",
        };
        println!("State:      {}", phase);
        match status.last_sync {
            Some(t) => println!("Last sync:  {}", t.to_rfc3339()),
            None => println!("Last sync:  never"),
        }
        println!("Pending:    {} operation(s)", orchestrator.pending_operations());
        println!("Conflicts:  {} awaiting review", orchestrator.conflicts().len());

        Ok(())
    }

    async fn watch(
        &self,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !config.sync.is_configured() {
            print_not_configured();
            return Ok(());
        }

        println!(
            "Watching for changes, syncing every {}s. Press Ctrl-C to stop.",
            config.sync.interval_secs
        );

        tokio::select! {
            _ = orchestrator.run() => {}
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Stopped.");
            }
        }
        Ok(())
    }

    async fn share(
        &self,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !config.sync.is_configured() {
            print_not_configured();
            return Ok(());
        }

        // The first successful cycle creates the remote document.
        orchestrator.sync_now().await?;

        match orchestrator.remote_doc_id() {
            Some(doc_id) => {
                println!("Household share is live.");
                println!();
                println!("  document id: {}", doc_id);
                println!();
                println!("Family members join with:");
                println!("  hearth sync join {}", doc_id);
            }
            None => {
                println!("Share did not produce a document id; check the remote configuration.");
            }
        }
        Ok(())
    }

    async fn join(
        &self,
        doc_id: &str,
        orchestrator: &mut Orchestrator,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !config.sync.is_configured() {
            print_not_configured();
            return Ok(());
        }

        orchestrator.adopt_remote_document(doc_id.to_string())?;
        println!("Joined document {}", doc_id);

        let report = orchestrator.sync_now().await?;
        print_report(&report);
        Ok(())
    }

    fn list_conflicts(
        &self,
        orchestrator: &Orchestrator,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let conflicts = orchestrator.conflicts();
        if conflicts.is_empty() {
            println!("No conflicts awaiting review.");
            return Ok(());
        }

        println!("{} conflict(s) awaiting review:", conflicts.len());
        println!();
        for conflict in conflicts {
            println!("  {}", conflict.id);
            println!("    {} record {}", conflict.collection, conflict.local.id);
            println!(
                "    local  modified {}",
                conflict.local.modified_at().to_rfc3339()
            );
            println!(
                "    remote modified {}",
                conflict.remote.modified_at().to_rfc3339()
            );
            println!(
                "    resolve: hearth sync conflicts resolve {} <local|remote>",
                conflict.id
            );
        }
        Ok(())
    }

    async fn resolve_conflict(
        &self,
        id: &str,
        keep: KeepSide,
        orchestrator: &mut Orchestrator,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let uuid = Uuid::parse_str(id).map_err(|_| format!("Invalid conflict UUID: {}", id))?;

        if orchestrator.resolve_conflict(uuid, keep.into()).await? {
            println!("Resolved conflict {} keeping the {} version.", uuid, side_name(keep));
        } else {
            println!("No conflict with id {}", uuid);
        }
        Ok(())
    }
}

fn side_name(side: KeepSide) -> &'static str {
    match side {
        KeepSide::Local => "local",
        KeepSide::Remote => "remote",
    }
}

fn print_report(report: &SyncReport) {
    match report {
        SyncReport::Completed {
            drained,
            remote_seen,
            conflicts,
            uploaded,
        } => {
            println!();
            if drained.sent > 0 {
                println!("  ✓ transmitted {} queued operation(s)", drained.sent);
            }
            if drained.dropped > 0 {
                println!("  ✗ dropped {} operation(s) after repeated failures", drained.dropped);
            }
            println!(
                "  {} remote snapshot",
                if *remote_seen { "✓ merged" } else { "– no" }
            );
            if *uploaded {
                println!("  ✓ uploaded merged snapshot");
            }
            if *conflicts > 0 {
                println!("  ! {} conflict(s) queued for review", conflicts);
            }
            println!();
            println!("Sync complete.");
        }
        SyncReport::SkippedOffline => {
            println!("Offline; sync skipped.");
        }
        SyncReport::AlreadySyncing => {
            println!("A sync is already running.");
        }
    }
}

fn print_not_configured() {
    println!("Status: Not configured");
    println!();
    println!("To enable sync, add to your config file:");
    println!();
    println!("  sync:");
    println!("    remote_url: \"https://sync.example.com\"");
    println!("    api_key: \"your-api-key\"");
    println!("    shared_secret: \"family passphrase\"");
    println!("    auto_sync: false");
    println!();
    println!("Or set environment variables:");
    println!("  HEARTH_SYNC_URL");
    println!("  HEARTH_SYNC_API_KEY");
    println!("  HEARTH_SYNC_SECRET");
}
