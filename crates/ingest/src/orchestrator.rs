//! Multi-platform run orchestration.
//!
//! Spawns one pipeline task per platform, lets every task run to a
//! terminal state, and folds the per-platform summaries into a single
//! report. A failed or panicked platform never aborts its siblings, and
//! the orchestrator always produces a report.

use std::sync::Arc;

use chrono::NaiveDate;
use orderhub_core::Platform;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::{FetchError, PageFetcher, PlatformClient};
use crate::config::IngestConfig;
use crate::driver::PaginationDriver;
use crate::flush::FlushCoordinator;
use crate::sink::PersistenceSink;
use crate::summary::{ErrorReport, ErrorStage, RunSummary};

/// Final report of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Correlation id for this run, also stamped on every log line.
    pub run_id: Uuid,
    pub summary: RunSummary,
}

/// Runs the platform pipelines concurrently and merges their summaries.
pub struct Orchestrator<F> {
    pipelines: Vec<PaginationDriver<F>>,
}

impl Orchestrator<PlatformClient> {
    /// Build HTTP-backed pipelines for `platforms` against one shared sink.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if an HTTP client cannot be constructed from
    /// a platform's profile.
    pub fn from_config(
        config: &IngestConfig,
        sink: Arc<dyn PersistenceSink>,
        cancel: &CancellationToken,
        platforms: &[Platform],
    ) -> Result<Self, FetchError> {
        let mut pipelines = Vec::with_capacity(platforms.len());
        for &platform in platforms {
            let profile = config.profile(platform);
            let client = PlatformClient::new(profile.clone(), cancel.child_token())?;
            pipelines.push(PaginationDriver::new(
                client,
                FlushCoordinator::new(sink.clone()),
                profile.page_size,
                config.buffer_capacity,
                cancel.child_token(),
            ));
        }
        Ok(Self { pipelines })
    }
}

impl<F> Orchestrator<F>
where
    F: PageFetcher + 'static,
{
    #[must_use]
    pub fn new(pipelines: Vec<PaginationDriver<F>>) -> Self {
        Self { pipelines }
    }

    /// Run every pipeline to completion and merge the results.
    pub async fn run(self, date: Option<NaiveDate>) -> IngestReport {
        let run_id = Uuid::new_v4();
        tracing::info!(run_id = %run_id, date = ?date, pipelines = self.pipelines.len(), "ingestion run starting");

        let mut handles: Vec<(Platform, JoinHandle<RunSummary>)> = Vec::new();
        for driver in self.pipelines {
            let platform = driver.platform();
            handles.push((platform, tokio::spawn(driver.run(date))));
        }

        let mut summary = RunSummary::empty();
        for (platform, handle) in handles {
            let piece = match handle.await {
                Ok(piece) => piece,
                Err(err) => panicked_pipeline(platform, &err),
            };
            summary = summary.merge(piece);
        }

        tracing::info!(
            run_id = %run_id,
            status = ?summary.status,
            api_calls = summary.api_calls,
            db_operations = summary.db_operations,
            persisted = summary.records_persisted(),
            filtered = summary.records_filtered,
            errors = summary.errors.len(),
            "ingestion run finished"
        );
        IngestReport { run_id, summary }
    }
}

/// Degrade a panicked pipeline task into a failed platform summary.
fn panicked_pipeline(platform: Platform, err: &JoinError) -> RunSummary {
    tracing::error!(platform = %platform, error = %err, "pipeline task panicked");
    let mut summary = RunSummary::begin();
    summary.record_error(ErrorReport::new(
        platform,
        ErrorStage::Task,
        format!("pipeline task failed: {err}"),
    ));
    summary.mark_failed();
    summary.finish();
    summary
}
