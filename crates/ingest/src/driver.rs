//! Per-platform pagination pipeline.
//!
//! Drives one platform's run end to end: fetch a page, drop invalid
//! records, buffer the rest, flush whenever the buffer reaches capacity,
//! and stop when the platform declares no further pages or hands back a
//! short page. Strictly sequential: page N+1 is never requested before
//! page N's records are buffered and any due flushes have committed.

use chrono::NaiveDate;
use orderhub_core::{OrderRecord, Platform};
use tokio_util::sync::CancellationToken;

use crate::buffer::Buffer;
use crate::client::{FetchError, PageFetcher, PageRequest};
use crate::flush::FlushCoordinator;
use crate::sink::SinkError;
use crate::summary::{ErrorReport, ErrorStage, RunSummary};

/// One platform's fetch -> buffer -> flush loop.
pub struct PaginationDriver<F> {
    fetcher: F,
    coordinator: FlushCoordinator,
    page_size: u32,
    buffer_capacity: usize,
    cancel: CancellationToken,
}

impl<F: PageFetcher> PaginationDriver<F> {
    #[must_use]
    pub const fn new(
        fetcher: F,
        coordinator: FlushCoordinator,
        page_size: u32,
        buffer_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            coordinator,
            page_size,
            buffer_capacity,
            cancel,
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.fetcher.platform()
    }

    /// Run the pipeline to completion and report what happened.
    ///
    /// Never returns an error: fetch exhaustion, flush failure, and
    /// cancellation all end the run early with a FAILED summary. Records
    /// still sitting in the buffer when a run fails are dropped, not
    /// half-flushed.
    pub async fn run(self, date: Option<NaiveDate>) -> RunSummary {
        let platform = self.fetcher.platform();
        let mut summary = RunSummary::begin();
        let mut buffer = Buffer::new(platform, self.buffer_capacity);
        let mut page = 1u32;

        loop {
            if self.cancel.is_cancelled() {
                return self.fail(summary, ErrorStage::Cancelled, "run cancelled");
            }

            let request = PageRequest::new(platform, date, page, self.page_size);
            summary.record_api_call();
            let result = match self.fetcher.fetch_page(&request).await {
                Ok(result) => result,
                Err(FetchError::Cancelled) => {
                    return self.fail(summary, ErrorStage::Cancelled, "run cancelled");
                }
                Err(err) => {
                    tracing::error!(platform = %platform, page, error = %err, "page fetch failed");
                    return self.fail(summary, ErrorStage::Fetch, err.to_string());
                }
            };

            for defect in &result.defects {
                summary.record_filtered(1);
                summary.record_error(ErrorReport::new(
                    platform,
                    ErrorStage::Decode,
                    format!("page {page} record {}: {}", defect.position, defect.reason),
                ));
            }

            let mut survivors = Vec::with_capacity(result.records.len());
            for record in result.records {
                if record.is_placeholder() {
                    tracing::warn!(
                        platform = %platform,
                        order_id = %record.order_id,
                        "skipping placeholder record"
                    );
                    summary.record_filtered(1);
                } else {
                    survivors.push(record);
                }
            }
            let buffered = survivors.len();
            buffer.append(survivors);
            tracing::debug!(
                platform = %platform,
                page,
                returned = result.returned_count,
                buffered,
                "page processed"
            );

            while buffer.is_at_threshold() {
                let drained = buffer.drain_chunk();
                if let Err(err) = self.flush_chunk(&mut summary, &drained).await {
                    tracing::error!(platform = %platform, error = %err, "flush failed");
                    return self.fail(summary, ErrorStage::Flush, err.to_string());
                }
            }

            let declared_done = result.declared_has_next == Some(false);
            let short_page = (result.returned_count as u64) < u64::from(self.page_size);
            if declared_done || short_page {
                break;
            }
            page += 1;
        }

        // End of stream on the success path: drain whatever is left.
        if !buffer.is_empty() {
            let drained = buffer.drain_all();
            if let Err(err) = self.flush_chunk(&mut summary, &drained).await {
                tracing::error!(platform = %platform, error = %err, "final flush failed");
                return self.fail(summary, ErrorStage::Flush, err.to_string());
            }
        }

        summary.finish();
        tracing::info!(
            platform = %platform,
            api_calls = summary.api_calls,
            persisted = summary.records_persisted(),
            filtered = summary.records_filtered,
            "platform run complete"
        );
        summary
    }

    async fn flush_chunk(
        &self,
        summary: &mut RunSummary,
        records: &[OrderRecord],
    ) -> Result<(), SinkError> {
        let platform = self.fetcher.platform();
        let outcome = self.coordinator.flush(platform, records).await?;
        summary.record_flush(
            platform,
            records.len() as u64,
            outcome.operations,
            &outcome.table_counts,
        );
        tracing::info!(
            platform = %platform,
            records = records.len(),
            operations = outcome.operations,
            "buffer flushed"
        );
        Ok(())
    }

    fn fail(&self, mut summary: RunSummary, stage: ErrorStage, message: impl Into<String>) -> RunSummary {
        summary.record_error(ErrorReport::new(self.fetcher.platform(), stage, message));
        summary.mark_failed();
        summary.finish();
        summary
    }
}
