//! Persistence sink contract and implementations.
//!
//! A flush hands the sink one [`FlushBatch`] - the eleven warehouse
//! projections built from a single buffer drain. Implementations must apply
//! the whole batch atomically: the Postgres sink wraps it in one
//! transaction, the in-memory sink applies it as one append.

pub mod entities;
pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use orderhub_core::Platform;
use thiserror::Error;

use entities::SinkTable;
pub use entities::{
    CustomerRow, DateDimensionRow, GeographyRow, OrderItemRow, OrderRow, OrderStatusDetailRow,
    OrderStatusRow, PaymentRow, ProductRow, ShippingRow, StatusRow,
};
pub use memory::MemorySink;
pub use postgres::PgSink;

/// Errors that can occur while persisting a batch.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Atomic write target for flush batches.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Apply one batch as a single atomic unit: either every projection in
    /// it lands or none does.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if any part of the batch cannot be applied;
    /// the sink must leave no partial writes behind.
    async fn persist(&self, batch: &FlushBatch) -> Result<FlushOutcome, SinkError>;
}

/// Rows bound for the warehouse, grouped by projection.
///
/// All rows in a batch come from the same platform's buffer drain and are
/// already deduplicated by natural key.
#[derive(Debug, Clone)]
pub struct FlushBatch {
    pub platform: Platform,
    pub customers: Vec<CustomerRow>,
    pub orders: Vec<OrderRow>,
    pub order_items: Vec<OrderItemRow>,
    pub products: Vec<ProductRow>,
    pub geographies: Vec<GeographyRow>,
    pub payments: Vec<PaymentRow>,
    pub shipments: Vec<ShippingRow>,
    pub dates: Vec<DateDimensionRow>,
    pub statuses: Vec<StatusRow>,
    pub order_statuses: Vec<OrderStatusRow>,
    pub order_status_details: Vec<OrderStatusDetailRow>,
}

impl FlushBatch {
    #[must_use]
    pub const fn new(platform: Platform) -> Self {
        Self {
            platform,
            customers: Vec::new(),
            orders: Vec::new(),
            order_items: Vec::new(),
            products: Vec::new(),
            geographies: Vec::new(),
            payments: Vec::new(),
            shipments: Vec::new(),
            dates: Vec::new(),
            statuses: Vec::new(),
            order_statuses: Vec::new(),
            order_status_details: Vec::new(),
        }
    }

    /// Per-table row counts, in a fixed order, for sinks and assertions.
    #[must_use]
    pub fn table_sizes(&self) -> [(&'static str, usize); 11] {
        [
            (CustomerRow::TABLE, self.customers.len()),
            (OrderRow::TABLE, self.orders.len()),
            (OrderItemRow::TABLE, self.order_items.len()),
            (ProductRow::TABLE, self.products.len()),
            (GeographyRow::TABLE, self.geographies.len()),
            (PaymentRow::TABLE, self.payments.len()),
            (ShippingRow::TABLE, self.shipments.len()),
            (DateDimensionRow::TABLE, self.dates.len()),
            (StatusRow::TABLE, self.statuses.len()),
            (OrderStatusRow::TABLE, self.order_statuses.len()),
            (OrderStatusDetailRow::TABLE, self.order_status_details.len()),
        ]
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table_sizes().iter().all(|(_, len)| *len == 0)
    }
}

/// What one persisted batch amounted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Database statements executed.
    pub operations: u64,
    /// Rows written per table.
    pub table_counts: BTreeMap<String, u64>,
}

impl FlushOutcome {
    pub(crate) fn record_table(&mut self, table: &str, statements: u64, rows: u64) {
        if statements == 0 {
            return;
        }
        self.operations += statements;
        *self.table_counts.entry(table.to_owned()).or_insert(0) += rows;
    }
}
