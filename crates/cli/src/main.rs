//! Order ingestion CLI.
//!
//! # Usage
//!
//! ```bash
//! # Ingest yesterday's completed orders from all three platforms
//! orderhub run --date 2024-08-12
//!
//! # Ingest a single platform without touching the warehouse
//! orderhub run --date 2024-08-12 --platform shopee --dry-run
//!
//! # Verify platform APIs and the warehouse are reachable
//! orderhub check
//! ```
//!
//! # Commands
//!
//! - `run` - Fetch, classify, and persist completed orders
//! - `check` - Probe every platform API and the warehouse connection

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use orderhub_core::Platform;
use orderhub_ingest::config::IngestConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "orderhub")]
#[command(author, version, about = "Order ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch completed orders and load them into the warehouse
    Run {
        /// Order date to ingest (YYYY-MM-DD); omit for the platforms' default window
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Restrict the run to one platform; repeat for several (default: all)
        #[arg(long = "platform")]
        platforms: Vec<Platform>,

        /// Fetch and classify but keep every write in memory
        #[arg(long)]
        dry_run: bool,
    },
    /// Probe the platform APIs and the warehouse connection
    Check,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed before tracing so the Sentry layer can hook in.
    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Initialize Sentry (must be done before the tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: IngestConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run {
            date,
            platforms,
            dry_run,
        } => {
            let platforms = if platforms.is_empty() {
                Platform::ALL.to_vec()
            } else {
                platforms
            };
            commands::run::execute(&config, date, &platforms, dry_run).await?;
        }
        Commands::Check => commands::check::execute(&config).await?,
    }
    Ok(())
}

/// Initialize Sentry error tracking and return a guard that must be kept alive.
fn init_sentry(config: &IngestConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orderhub=info,orderhub_ingest=info,orderhub_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}
