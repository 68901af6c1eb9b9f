//! In-memory sink for dry runs and tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{FlushBatch, FlushOutcome, PersistenceSink, SinkError};

/// Sink that keeps every batch in memory instead of writing anywhere.
///
/// Reports one operation per non-empty projection, mirroring the statement
/// count the Postgres sink would execute for an unchunked batch.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<FlushBatch>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch persisted so far, in arrival order.
    #[must_use]
    pub fn batches(&self) -> Vec<FlushBatch> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl PersistenceSink for MemorySink {
    async fn persist(&self, batch: &FlushBatch) -> Result<FlushOutcome, SinkError> {
        let mut outcome = FlushOutcome::default();
        for (table, len) in batch.table_sizes() {
            if len > 0 {
                outcome.record_table(table, 1, len as u64);
            }
        }
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.clone());
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use orderhub_core::Platform;

    use super::super::OrderStatusRow;
    use super::*;

    #[tokio::test]
    async fn records_batches_and_counts_rows() {
        let sink = MemorySink::new();
        let mut batch = FlushBatch::new(Platform::Lazada);
        batch.order_statuses.push(OrderStatusRow {
            platform: Platform::Lazada,
            order_id: "90001".to_owned(),
            lifecycle_state: "active".to_owned(),
            status_code: None,
            status_name: None,
            partner_status: None,
        });

        let outcome = sink.persist(&batch).await.unwrap();

        assert_eq!(outcome.operations, 1);
        assert_eq!(outcome.table_counts.get("order_status"), Some(&1));
        assert_eq!(sink.batch_count(), 1);
        assert_eq!(sink.batches()[0].platform, Platform::Lazada);
    }
}
