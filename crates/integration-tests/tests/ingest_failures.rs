//! Failure isolation across concurrent platform pipelines.
//!
//! A platform outage, a refusing warehouse, or a cancelled run must each
//! degrade to a failed entry in the merged report without taking sibling
//! pipelines down or losing the report itself.

use std::sync::Arc;

use orderhub_core::Platform;
use orderhub_ingest::client::FetchError;
use orderhub_ingest::orchestrator::Orchestrator;
use orderhub_ingest::sink::MemorySink;
use orderhub_ingest::summary::{ErrorStage, RunStatus};
use orderhub_integration_tests::{page, pipeline, FailingSink};
use tokio_util::sync::CancellationToken;

fn outage(platform: Platform) -> FetchError {
    FetchError::Status {
        platform,
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
    }
}

// =============================================================================
// Fetch Failures
// =============================================================================

#[tokio::test]
async fn test_fetch_outage_on_one_platform_spares_the_others() {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(vec![
        pipeline(
            Platform::Shopee,
            vec![Ok(page(Platform::Shopee, 0, 2, Some(false)))],
            sink.clone(),
            100,
            150,
            CancellationToken::new(),
        ),
        pipeline(
            Platform::Lazada,
            vec![Err(outage(Platform::Lazada))],
            sink.clone(),
            100,
            150,
            CancellationToken::new(),
        ),
        pipeline(
            Platform::TiktokShop,
            vec![Ok(page(Platform::TiktokShop, 0, 1, Some(false)))],
            sink.clone(),
            100,
            150,
            CancellationToken::new(),
        ),
    ]);

    let report = orchestrator.run(None).await;

    assert_eq!(report.summary.status, RunStatus::Failed);
    assert_eq!(report.summary.errors.len(), 1);
    assert_eq!(report.summary.errors[0].platform, Platform::Lazada);
    assert_eq!(report.summary.errors[0].stage, ErrorStage::Fetch);

    // The healthy platforms finished their work.
    assert_eq!(
        report.summary.platform_counts.get(&Platform::Shopee),
        Some(&2)
    );
    assert_eq!(
        report.summary.platform_counts.get(&Platform::TiktokShop),
        Some(&1)
    );
    assert!(!report.summary.platform_counts.contains_key(&Platform::Lazada));
    assert_eq!(sink.batch_count(), 2);
}

#[tokio::test]
async fn test_every_platform_down_still_yields_a_complete_report() {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(
        Platform::ALL
            .into_iter()
            .map(|platform| {
                pipeline(
                    platform,
                    vec![Err(outage(platform))],
                    sink.clone(),
                    100,
                    150,
                    CancellationToken::new(),
                )
            })
            .collect(),
    );

    let report = orchestrator.run(None).await;

    assert_eq!(report.summary.status, RunStatus::Failed);
    assert_eq!(report.summary.api_calls, 3);
    assert_eq!(report.summary.errors.len(), 3);
    assert!(report
        .summary
        .errors
        .iter()
        .all(|e| e.stage == ErrorStage::Fetch));
    assert_eq!(report.summary.records_persisted(), 0);
    assert!(report.summary.platform_counts.is_empty());
    assert!(report.summary.started_at.is_some());
    assert!(report.summary.finished_at.is_some());
    assert_eq!(sink.batch_count(), 0);
}

// =============================================================================
// Flush Failures
// =============================================================================

#[tokio::test]
async fn test_flush_failure_stops_one_platform_only() {
    let healthy = Arc::new(MemorySink::new());
    let refusing = Arc::new(FailingSink::failing_after(0));
    let orchestrator = Orchestrator::new(vec![
        pipeline(
            Platform::Shopee,
            vec![Ok(page(Platform::Shopee, 0, 2, Some(false)))],
            healthy.clone(),
            100,
            150,
            CancellationToken::new(),
        ),
        pipeline(
            Platform::Lazada,
            vec![Ok(page(Platform::Lazada, 0, 3, Some(false)))],
            refusing.clone(),
            100,
            150,
            CancellationToken::new(),
        ),
    ]);

    let report = orchestrator.run(None).await;

    assert_eq!(report.summary.status, RunStatus::Failed);
    assert_eq!(report.summary.errors.len(), 1);
    assert_eq!(report.summary.errors[0].platform, Platform::Lazada);
    assert_eq!(report.summary.errors[0].stage, ErrorStage::Flush);
    assert_eq!(
        report.summary.platform_counts.get(&Platform::Shopee),
        Some(&2)
    );
    assert!(!report.summary.platform_counts.contains_key(&Platform::Lazada));
    assert!(refusing.accepted().is_empty());
}

/// A failing later flush must not roll back flushes that already committed:
/// the first 150 records stay persisted and counted, the trailing 87 are
/// dropped with the run marked failed.
#[tokio::test]
async fn test_later_flush_failure_keeps_earlier_flushes() {
    let sink = Arc::new(FailingSink::failing_after(1));
    let orchestrator = Orchestrator::new(vec![pipeline(
        Platform::Shopee,
        vec![
            Ok(page(Platform::Shopee, 0, 100, None)),
            Ok(page(Platform::Shopee, 100, 100, None)),
            Ok(page(Platform::Shopee, 200, 37, None)),
        ],
        sink.clone(),
        100,
        150,
        CancellationToken::new(),
    )]);

    let report = orchestrator.run(None).await;

    assert_eq!(report.summary.status, RunStatus::Failed);
    assert_eq!(report.summary.errors[0].stage, ErrorStage::Flush);
    assert_eq!(
        report.summary.platform_counts.get(&Platform::Shopee),
        Some(&150)
    );
    let accepted = sink.accepted();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].orders.len(), 150);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancelled_pipeline_reports_without_aborting_siblings() {
    let sink = Arc::new(MemorySink::new());
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let orchestrator = Orchestrator::new(vec![
        pipeline(
            Platform::Shopee,
            vec![Ok(page(Platform::Shopee, 0, 1, Some(false)))],
            sink.clone(),
            100,
            150,
            CancellationToken::new(),
        ),
        pipeline(
            Platform::TiktokShop,
            vec![Ok(page(Platform::TiktokShop, 0, 1, Some(false)))],
            sink.clone(),
            100,
            150,
            cancelled,
        ),
    ]);

    let report = orchestrator.run(None).await;

    assert_eq!(report.summary.status, RunStatus::Failed);
    assert_eq!(report.summary.errors.len(), 1);
    assert_eq!(report.summary.errors[0].platform, Platform::TiktokShop);
    assert_eq!(report.summary.errors[0].stage, ErrorStage::Cancelled);
    assert_eq!(
        report.summary.platform_counts.get(&Platform::Shopee),
        Some(&1)
    );
    assert_eq!(sink.batch_count(), 1);
}
