//! Postgres warehouse sink.
//!
//! One flush is one transaction: every non-empty projection becomes a bulk
//! `INSERT .. ON CONFLICT` statement, chunked under the Postgres bind-
//! parameter limit, and the whole set commits or rolls back together.
//! Statements are assembled at runtime with [`QueryBuilder`], so table
//! DDL lives with the warehouse, not in this crate.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use super::entities::SinkTable;
use super::{
    CustomerRow, DateDimensionRow, FlushBatch, FlushOutcome, GeographyRow, OrderItemRow, OrderRow,
    OrderStatusDetailRow, OrderStatusRow, PaymentRow, PersistenceSink, ProductRow, ShippingRow,
    SinkError, StatusRow,
};

/// Postgres limit on bind parameters per statement.
const BIND_LIMIT: usize = 65_535;

/// Sink writing to the warehouse database.
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    /// Connect to the warehouse with the standard pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Database`] if the connection cannot be
    /// established.
    pub async fn connect(database_url: &SecretString) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url.expose_secret())
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Round-trip a trivial query to confirm the warehouse is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Database`] if the query fails.
    pub async fn ping(&self) -> Result<(), SinkError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for PgSink {
    #[tracing::instrument(skip_all, fields(platform = %batch.platform))]
    async fn persist(&self, batch: &FlushBatch) -> Result<FlushOutcome, SinkError> {
        let mut tx = self.pool.begin().await?;
        let mut outcome = FlushOutcome::default();

        // Dimensions first, then order-grain tables.
        let (statements, rows) = upsert_rows(&mut tx, &batch.customers).await?;
        outcome.record_table(CustomerRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.products).await?;
        outcome.record_table(ProductRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.geographies).await?;
        outcome.record_table(GeographyRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.dates).await?;
        outcome.record_table(DateDimensionRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.statuses).await?;
        outcome.record_table(StatusRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.orders).await?;
        outcome.record_table(OrderRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.order_items).await?;
        outcome.record_table(OrderItemRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.payments).await?;
        outcome.record_table(PaymentRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.shipments).await?;
        outcome.record_table(ShippingRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.order_statuses).await?;
        outcome.record_table(OrderStatusRow::TABLE, statements, rows);
        let (statements, rows) = upsert_rows(&mut tx, &batch.order_status_details).await?;
        outcome.record_table(OrderStatusDetailRow::TABLE, statements, rows);

        tx.commit().await?;
        tracing::debug!(
            operations = outcome.operations,
            tables = outcome.table_counts.len(),
            "flush committed"
        );
        Ok(outcome)
    }
}

async fn upsert_rows<T: SinkTable>(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[T],
) -> Result<(u64, u64), sqlx::Error> {
    if rows.is_empty() {
        return Ok((0, 0));
    }
    let mut statements = 0u64;
    let mut affected = 0u64;
    for chunk in rows.chunks(chunk_rows(T::COLUMNS.len())) {
        let mut statement = build_statement(chunk);
        let result = statement.build().execute(&mut **tx).await?;
        statements += 1;
        affected += result.rows_affected();
    }
    Ok((statements, affected))
}

/// Rows per statement that keep `rows * columns` under [`BIND_LIMIT`].
const fn chunk_rows(columns: usize) -> usize {
    BIND_LIMIT / columns
}

fn build_statement<'args, T: SinkTable>(chunk: &'args [T]) -> QueryBuilder<'args, Postgres> {
    let mut builder: QueryBuilder<'args, Postgres> = QueryBuilder::new("INSERT INTO ");
    builder.push(T::TABLE);
    builder.push(" (");
    builder.push(T::COLUMNS.join(", "));
    builder.push(") ");
    builder.push_values(chunk.iter(), |mut row, entity| {
        entity.push_fields(&mut row);
    });
    builder.push(" ON CONFLICT (");
    builder.push(T::KEY.join(", "));
    builder.push(")");

    let updates: Vec<String> = T::COLUMNS
        .iter()
        .filter(|column| !T::KEY.contains(column))
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect();
    if updates.is_empty() {
        builder.push(" DO NOTHING");
    } else {
        builder.push(" DO UPDATE SET ");
        builder.push(updates.join(", "));
    }
    builder
}
