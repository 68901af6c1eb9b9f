//! End-to-end ingestion runs over scripted platform APIs.
//!
//! Every test drives the real orchestrator, pagination driver, buffer, and
//! flush coordinator together; only the HTTP edge and the warehouse are
//! faked.

use std::sync::Arc;

use orderhub_core::{CustomerInfo, OrderRecord, Platform};
use orderhub_ingest::orchestrator::Orchestrator;
use orderhub_ingest::sink::MemorySink;
use orderhub_ingest::summary::RunStatus;
use orderhub_integration_tests::{page, page_of, pipeline};
use tokio_util::sync::CancellationToken;

fn order_with_customer(platform: Platform, order_id: &str, customer_id: &str) -> OrderRecord {
    let mut record = OrderRecord::new(platform, order_id);
    record.customer = Some(CustomerInfo {
        customer_id: customer_id.to_owned(),
        name: Some("Mai".to_owned()),
        phone: None,
        email: None,
    });
    record
}

// =============================================================================
// Flush Cadence
// =============================================================================

/// 237 records at buffer capacity 150 must land as a 150-record flush and an
/// 87-record end-of-stream flush, with the short third page ending the run.
#[tokio::test]
async fn test_run_flushes_at_capacity_and_reports_totals() {
    let sink = Arc::new(MemorySink::new());
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

    assert_eq!(report.summary.status, RunStatus::Succeeded);
    assert_eq!(report.summary.api_calls, 3);
    assert_eq!(
        report.summary.platform_counts.get(&Platform::Shopee),
        Some(&237)
    );
    assert_eq!(report.summary.table_counts.get("orders"), Some(&237));
    assert_eq!(report.summary.table_counts.get("order_status"), Some(&237));

    let sizes: Vec<usize> = sink.batches().iter().map(|b| b.orders.len()).collect();
    assert_eq!(sizes, vec![150, 87]);
}

#[tokio::test]
async fn test_declared_end_skips_the_trailing_call() {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(vec![pipeline(
        Platform::Lazada,
        vec![Ok(page(Platform::Lazada, 0, 100, Some(false)))],
        sink.clone(),
        100,
        150,
        CancellationToken::new(),
    )]);

    let report = orchestrator.run(None).await;

    // A full page normally costs one more probe; the explicit flag saves it.
    assert_eq!(report.summary.api_calls, 1);
    assert_eq!(
        report.summary.platform_counts.get(&Platform::Lazada),
        Some(&100)
    );
}

// =============================================================================
// Multi-Platform Merge
// =============================================================================

#[tokio::test]
async fn test_three_platforms_merge_into_one_report() {
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
            vec![Ok(page(Platform::Lazada, 0, 3, Some(false)))],
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

    assert_eq!(report.summary.status, RunStatus::Succeeded);
    assert_eq!(report.summary.api_calls, 3);
    assert_eq!(report.summary.records_persisted(), 6);
    assert_eq!(
        report.summary.platform_counts.get(&Platform::Shopee),
        Some(&2)
    );
    assert_eq!(
        report.summary.platform_counts.get(&Platform::Lazada),
        Some(&3)
    );
    assert_eq!(
        report.summary.platform_counts.get(&Platform::TiktokShop),
        Some(&1)
    );

    // Each platform flushed its own batch; none were mixed.
    let batches = sink.batches();
    assert_eq!(batches.len(), 3);
    for batch in &batches {
        assert!(batch.orders.iter().all(|o| o.platform == batch.platform));
    }
}

// =============================================================================
// Dedup Scope
// =============================================================================

/// Natural-key dedup is per flush: four orders from one buyer in a single
/// flush yield one customer row, but a second flush emits the row again and
/// leaves the idempotent upsert to the warehouse.
#[tokio::test]
async fn test_dimensions_dedupe_within_a_flush_not_across() {
    let sink = Arc::new(MemorySink::new());
    let records = (0..4)
        .map(|n| order_with_customer(Platform::Shopee, &format!("24080{n}"), "C-100"))
        .collect();
    let orchestrator = Orchestrator::new(vec![pipeline(
        Platform::Shopee,
        vec![Ok(page_of(records, Some(false)))],
        sink.clone(),
        100,
        2,
        CancellationToken::new(),
    )]);

    let report = orchestrator.run(None).await;

    assert_eq!(report.summary.status, RunStatus::Succeeded);
    let batches = sink.batches();
    assert_eq!(batches.len(), 2);
    for batch in &batches {
        assert_eq!(batch.orders.len(), 2);
        assert_eq!(batch.customers.len(), 1);
        assert_eq!(batch.customers[0].customer_id, "C-100");
    }
    // The customer row was written once per flush.
    assert_eq!(report.summary.table_counts.get("customers"), Some(&2));
}
