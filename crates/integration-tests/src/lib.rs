//! Integration tests for the order ingestion pipeline.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p orderhub-integration-tests
//! ```
//!
//! The tests run the real orchestrator, pagination driver, buffer, and
//! flush coordinator; only the two edges are faked. [`ScriptedFetcher`]
//! stands in for a platform order API and [`FailingSink`] (or the ingest
//! crate's `MemorySink`) stands in for the warehouse.
//!
//! # Test Categories
//!
//! - `ingest_pipeline` - Pagination, flush cadence, multi-platform merge
//! - `ingest_failures` - Outage and flush-failure isolation
//! - `ingest_classification` - Raw payloads through to lifecycle states

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use orderhub_core::{OrderRecord, Platform};
use orderhub_ingest::client::{FetchError, PageFetcher, PageRequest, PageResult};
use orderhub_ingest::driver::PaginationDriver;
use orderhub_ingest::flush::FlushCoordinator;
use orderhub_ingest::sink::{FlushBatch, FlushOutcome, MemorySink, PersistenceSink, SinkError};
use tokio_util::sync::CancellationToken;

/// Plays back a fixed sequence of page responses for one platform.
///
/// Once the script runs out it answers with empty final pages, so a driver
/// that keeps asking terminates instead of hanging the test.
pub struct ScriptedFetcher {
    platform: Platform,
    pages: Mutex<VecDeque<Result<PageResult, FetchError>>>,
}

impl ScriptedFetcher {
    #[must_use]
    pub fn new(platform: Platform, pages: Vec<Result<PageResult, FetchError>>) -> Self {
        Self {
            platform,
            pages: Mutex::new(pages.into()),
        }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_page(&self, _request: &PageRequest) -> Result<PageResult, FetchError> {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(page(self.platform, 0, 0, Some(false))))
    }
}

/// Sink that accepts a fixed number of batches, then refuses every further
/// one with a database error. Accepted batches stay inspectable.
pub struct FailingSink {
    inner: MemorySink,
    budget: usize,
    seen: AtomicUsize,
}

impl FailingSink {
    /// A sink that persists the first `budget` batches and fails from then
    /// on; `failing_after(0)` rejects everything.
    #[must_use]
    pub fn failing_after(budget: usize) -> Self {
        Self {
            inner: MemorySink::new(),
            budget,
            seen: AtomicUsize::new(0),
        }
    }

    /// The batches that made it in before the budget ran out.
    #[must_use]
    pub fn accepted(&self) -> Vec<FlushBatch> {
        self.inner.batches()
    }
}

#[async_trait]
impl PersistenceSink for FailingSink {
    async fn persist(&self, batch: &FlushBatch) -> Result<FlushOutcome, SinkError> {
        let n = self.seen.fetch_add(1, Ordering::SeqCst);
        if n < self.budget {
            self.inner.persist(batch).await
        } else {
            Err(SinkError::Database(sqlx::Error::PoolClosed))
        }
    }
}

/// A page of minimal records with ids `{platform}-{start:05}` onwards.
#[must_use]
pub fn page(
    platform: Platform,
    start: usize,
    count: usize,
    declared_has_next: Option<bool>,
) -> PageResult {
    let records = (start..start + count)
        .map(|n| OrderRecord::new(platform, format!("{platform}-{n:05}")))
        .collect();
    page_of(records, declared_has_next)
}

/// A page built from explicit records, with no defects.
#[must_use]
pub fn page_of(records: Vec<OrderRecord>, declared_has_next: Option<bool>) -> PageResult {
    let returned_count = records.len();
    PageResult {
        records,
        defects: Vec::new(),
        declared_has_next,
        returned_count,
    }
}

/// A pipeline wired to a scripted fetcher and the given sink.
#[must_use]
pub fn pipeline(
    platform: Platform,
    pages: Vec<Result<PageResult, FetchError>>,
    sink: Arc<dyn PersistenceSink>,
    page_size: u32,
    buffer_capacity: usize,
    cancel: CancellationToken,
) -> PaginationDriver<ScriptedFetcher> {
    PaginationDriver::new(
        ScriptedFetcher::new(platform, pages),
        FlushCoordinator::new(sink),
        page_size,
        buffer_capacity,
        cancel,
    )
}
