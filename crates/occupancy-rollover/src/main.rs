//! Occupancy Rollover
//!
//! `serve` runs the midnight scheduler until SIGINT/SIGTERM. `run --date`
//! performs a single manual rollover and prints its summary as JSON.

use clap::{Parser, Subcommand};
use occupancy_rollover::clock::SystemClock;
use occupancy_rollover::config::Config;
use occupancy_rollover::services::{PgRolloverStore, RolloverService};
use occupancy_rollover::tasks::RolloverScheduler;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "occupancy-rollover",
    version = env!("CARGO_PKG_VERSION"),
    about = "Daily bed occupancy rollover",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the rollover at every local midnight until stopped
    Serve,

    /// Roll over a single date now
    Run {
        /// Date to roll over, as yyyy-mm-dd
        #[arg(long)]
        date: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "occupancy_rollover=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().map_err(|e| {
        error!(target: "rollover.cli", "Failed to load configuration: {}", e);
        e
    })?;

    info!(
        target: "rollover.cli",
        time_zone = config.time_zone.name(),
        db_max_connections = config.db_max_connections,
        "Configuration loaded successfully"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_seconds))
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!(target: "rollover.cli", "Failed to connect to database: {}", e);
            e
        })?;

    info!(target: "rollover.cli", "Database connection established");

    let store = Arc::new(PgRolloverStore::new(pool.clone()));
    let service = Arc::new(RolloverService::new(store, config.time_zone));

    let result = match cli.command {
        Commands::Serve => serve(service).await,
        Commands::Run { date } => run_once(&service, &date).await,
    };

    pool.close().await;
    info!(target: "rollover.cli", "Occupancy rollover shutdown complete");

    result
}

async fn serve(service: Arc<RolloverService>) -> anyhow::Result<()> {
    let scheduler = RolloverScheduler::start(service, Arc::new(SystemClock));

    shutdown_signal().await;

    scheduler.shutdown().await?;
    Ok(())
}

async fn run_once(service: &RolloverService, date: &str) -> anyhow::Result<()> {
    let summary = service.run_manual(date).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!(target: "rollover.cli", "Received SIGINT, stopping scheduler..."),
            Err(e) => error!(target: "rollover.cli", "Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!(target: "rollover.cli", "Received SIGTERM, stopping scheduler...");
            }
            Err(e) => {
                error!(target: "rollover.cli", "Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
