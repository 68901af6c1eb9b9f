//! Ingestion run command.
//!
//! # Usage
//!
//! ```bash
//! # All platforms, one order date
//! orderhub run --date 2024-08-12
//!
//! # One platform, nothing written to the warehouse
//! orderhub run --date 2024-08-12 --platform shopee --dry-run
//! ```
//!
//! Ctrl+C cancels the run: in-flight retries stop waiting and every
//! pipeline ends at its next loop boundary with a FAILED summary.

use std::sync::Arc;

use chrono::NaiveDate;
use orderhub_core::Platform;
use orderhub_ingest::client::FetchError;
use orderhub_ingest::config::IngestConfig;
use orderhub_ingest::orchestrator::{IngestReport, Orchestrator};
use orderhub_ingest::sink::{MemorySink, PersistenceSink, PgSink, SinkError};
use orderhub_ingest::summary::RunStatus;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during an ingestion run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Could not build a platform HTTP client.
    #[error("client setup error: {0}")]
    Client(#[from] FetchError),

    /// Could not connect to the warehouse.
    #[error("warehouse connection error: {0}")]
    Sink(#[from] SinkError),

    /// The run completed but at least one platform failed.
    #[error("run finished with {errors} error(s); see log output")]
    Failed { errors: usize },
}

/// Run the ingestion pipeline for `platforms` on `date`.
///
/// # Arguments
///
/// * `config` - Loaded environment configuration
/// * `date` - Order date to ingest, forwarded to every platform API
/// * `platforms` - Platforms to run, one concurrent pipeline each
/// * `dry_run` - Keep all writes in memory instead of the warehouse
///
/// # Errors
///
/// Returns [`RunError`] if setup fails or any platform pipeline ends in a
/// failed state. Sibling platforms still run to completion either way.
pub async fn execute(
    config: &IngestConfig,
    date: Option<NaiveDate>,
    platforms: &[Platform],
    dry_run: bool,
) -> Result<(), RunError> {
    let cancel = CancellationToken::new();
    spawn_interrupt_watcher(cancel.clone());

    let sink: Arc<dyn PersistenceSink> = if dry_run {
        tracing::info!("dry run: writes stay in memory");
        Arc::new(MemorySink::new())
    } else {
        Arc::new(PgSink::connect(&config.database_url).await?)
    };

    let orchestrator = Orchestrator::from_config(config, sink, &cancel, platforms)?;
    let report = orchestrator.run(date).await;
    print_report(&report);

    match report.summary.status {
        RunStatus::Succeeded => Ok(()),
        RunStatus::Failed => Err(RunError::Failed {
            errors: report.summary.errors.len(),
        }),
    }
}

fn spawn_interrupt_watcher(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });
}

fn print_report(report: &IngestReport) {
    let summary = &report.summary;
    tracing::info!("Run {} finished: {:?}", report.run_id, summary.status);
    tracing::info!("  API calls:     {}", summary.api_calls);
    tracing::info!("  DB operations: {}", summary.db_operations);
    tracing::info!("  Filtered:      {}", summary.records_filtered);
    for (platform, count) in &summary.platform_counts {
        tracing::info!("  {platform}: {count} records persisted");
    }
    for (table, count) in &summary.table_counts {
        tracing::info!("    {table}: {count} rows");
    }
    for error in &summary.errors {
        tracing::error!(
            "  [{}] {} at {}: {}",
            error.platform,
            error.stage,
            error.occurred_at,
            error.message
        );
    }
}
