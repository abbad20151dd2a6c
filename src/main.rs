mod config;
mod images;
mod models;
mod normalizer;
mod portal;
mod scheduler;
mod store;
mod sync;
mod validator;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use images::ImageResolver;
use normalizer::RawRecord;
use portal::{ChromeLauncher, PublicationDriver};
use scheduler::AutoSyncScheduler;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use store::{JsonDirStore, ListingStore};
use sync::{PublishRequest, SyncOrchestrator};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Publish property listings to a classifieds portal through a browser
#[derive(Parser)]
#[command(name = "listing-sync", version, about)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sweep Pending listings now and on every interval until Ctrl-C
    Serve,
    /// Run a single sweep over Pending listings
    Sweep,
    /// Publish one listing by id, or a JSON payload file
    Publish {
        /// Stored listing id
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        id: Option<String>,
        /// JSON record of any supported shape; stored before publishing
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Move a Failed or Published listing back to Pending
    Reset {
        id: String,
        /// Also release a listing left in Syncing by an interrupted run
        #[arg(long)]
        force: bool,
    },
    /// Normalize and validate a JSON payload without publishing it
    Validate { file: PathBuf },
    /// Show every stored listing and its state
    List,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::from_env()?;

    match cli.command {
        Command::Validate { file } => {
            let listing = normalizer::normalize(&read_payload(&file)?);
            let report = validator::validate(&listing);
            println!("{}", serde_json::to_string_pretty(&listing)?);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(exit_code(report.is_valid))
        }
        Command::List => {
            let store = JsonDirStore::open(&config.store_dir).await?;
            for listing in store.list().await? {
                let status = &listing.status;
                let detail = match (status.published_at(), status.last_error()) {
                    (Some(at), _) => format!("published {}", at.to_rfc3339()),
                    (None, Some(error)) => error.to_string(),
                    (None, None) => String::new(),
                };
                println!(
                    "{}  {:<9}  {} / {}  {}",
                    listing.id,
                    status.state().to_string(),
                    listing.city,
                    listing.locality,
                    detail
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset { id, force } => {
            let orchestrator = build_orchestrator(&config).await?;
            match orchestrator.reset(&id, force).await? {
                Some(_) => {
                    info!("Listing {} is Pending again", id);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("No listing with id {id}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Publish { id, file } => {
            let orchestrator = build_orchestrator(&config).await?;
            let request = match (id, file) {
                (_, Some(file)) => PublishRequest::Payload(read_payload(&file)?),
                (Some(id), None) => PublishRequest::Id(id),
                (None, None) => anyhow::bail!("either an id or --file is required"),
            };
            let outcome = orchestrator.publish(request).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_code(outcome.success))
        }
        Command::Sweep => {
            let scheduler = AutoSyncScheduler::new(build_orchestrator(&config).await?, config.sync_interval);
            let result = scheduler.run_sweep().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve => {
            let scheduler = Arc::new(AutoSyncScheduler::new(
                build_orchestrator(&config).await?,
                config.sync_interval,
            ));
            let handle = scheduler.start();
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down; an in-progress sweep will finish first");
            handle.stop().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn build_orchestrator(config: &Config) -> Result<Arc<SyncOrchestrator>> {
    let store: Arc<dyn ListingStore> = Arc::new(JsonDirStore::open(&config.store_dir).await?);
    let resolver = ImageResolver::new(config.images_dir(), config.image_timeout)?;
    // The browser stays silent through the whole OTP wait
    let launcher = Arc::new(ChromeLauncher::new(
        config.headless,
        config.profiles_dir(),
        config.otp_wait + Duration::from_secs(120),
    ));
    let driver = PublicationDriver::new(config.layout.clone(), config.otp_wait);

    info!(
        store = %config.store_dir.display(),
        portal = %config.layout.post_url,
        "Listing sync ready"
    );
    Ok(Arc::new(SyncOrchestrator::new(store, resolver, launcher, driver)))
}

fn read_payload(path: &Path) -> Result<RawRecord> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("{} is not a JSON object", path.display()))
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
