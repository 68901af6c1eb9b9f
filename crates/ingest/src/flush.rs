//! Buffer-drain flushing: classify, project, dedupe, persist.
//!
//! One flush takes the records drained from a buffer, classifies each one,
//! fans them out into the eleven warehouse projections, drops in-batch
//! duplicates by natural key (first write wins, later duplicates are
//! silently discarded, never merged), and submits the whole batch to the
//! sink as a single atomic unit.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use orderhub_core::{OrderRecord, Platform};

use crate::classify;
use crate::sink::{
    CustomerRow, DateDimensionRow, FlushBatch, FlushOutcome, GeographyRow, OrderItemRow, OrderRow,
    OrderStatusDetailRow, OrderStatusRow, PaymentRow, PersistenceSink, ProductRow, ShippingRow,
    SinkError, StatusRow,
};

/// Turns drained records into sink batches.
pub struct FlushCoordinator {
    sink: Arc<dyn PersistenceSink>,
}

impl FlushCoordinator {
    #[must_use]
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self { sink }
    }

    /// Project `records` into a batch and persist it atomically.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the sink rejects the batch; nothing from
    /// this flush is persisted in that case.
    pub async fn flush(
        &self,
        platform: Platform,
        records: &[OrderRecord],
    ) -> Result<FlushOutcome, SinkError> {
        let batch = project_batch(platform, records);
        self.sink.persist(&batch).await
    }
}

/// Build the eleven projections for one drained buffer.
#[must_use]
pub fn project_batch(platform: Platform, records: &[OrderRecord]) -> FlushBatch {
    let mut batch = FlushBatch::new(platform);
    let mut seen_customers: HashSet<String> = HashSet::new();
    let mut seen_orders: HashSet<String> = HashSet::new();
    let mut seen_items: HashSet<(String, String)> = HashSet::new();
    let mut seen_products: HashSet<(String, String)> = HashSet::new();
    let mut seen_geographies: HashSet<(String, String, String)> = HashSet::new();
    let mut seen_payments: HashSet<String> = HashSet::new();
    let mut seen_shipments: HashSet<String> = HashSet::new();
    let mut seen_dates: HashSet<i32> = HashSet::new();
    let mut seen_statuses: HashSet<i32> = HashSet::new();
    let mut seen_order_statuses: HashSet<String> = HashSet::new();

    for record in records {
        let state = classify::classify(record);
        let order_date = record.ordered_at.map(|at| at.date_naive());
        let order_date_key = order_date.map(date_key);

        if let Some(customer) = &record.customer {
            if seen_customers.insert(customer.customer_id.clone()) {
                batch.customers.push(CustomerRow {
                    platform,
                    customer_id: customer.customer_id.clone(),
                    name: customer.name.clone(),
                    phone: customer.phone.clone(),
                    email: customer.email.clone(),
                });
            }
        }

        if seen_orders.insert(record.order_id.clone()) {
            batch.orders.push(OrderRow {
                platform,
                order_id: record.order_id.clone(),
                order_number: record.order_number.clone(),
                ordered_at: record.ordered_at,
                date_key: order_date_key,
                customer_id: record.customer.as_ref().map(|c| c.customer_id.clone()),
                cod_amount: record.financials.cod_amount,
                tax_amount: record.financials.tax_amount,
                shipping_fee: record.financials.shipping_fee,
                total_after_discount: record.financials.total_after_discount,
                source: record.source.clone(),
            });
        }

        for item in &record.items {
            let product_id = item.platform_product_id.clone().unwrap_or_default();
            if seen_items.insert((record.order_id.clone(), item.sku.clone())) {
                batch.order_items.push(OrderItemRow {
                    platform,
                    order_id: record.order_id.clone(),
                    sku: item.sku.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    return_quantity: item.return_quantity,
                });
            }
            if seen_products.insert((item.sku.clone(), product_id.clone())) {
                batch.products.push(ProductRow {
                    platform,
                    sku: item.sku.clone(),
                    platform_product_id: product_id,
                    name: item.name.clone(),
                });
            }
        }

        if let Some(address) = &record.shipping_address {
            let province = address.province.clone().unwrap_or_default();
            let district = address.district.clone().unwrap_or_default();
            let ward = address.ward.clone().unwrap_or_default();
            if seen_geographies.insert((province.clone(), district.clone(), ward.clone())) {
                batch.geographies.push(GeographyRow {
                    province,
                    district,
                    ward,
                });
            }
        }

        if seen_payments.insert(record.order_id.clone()) {
            batch.payments.push(PaymentRow {
                platform,
                order_id: record.order_id.clone(),
                payment_method: record.payment_method.clone(),
                cod_amount: record.financials.cod_amount,
            });
        }

        if seen_shipments.insert(record.order_id.clone()) {
            let address = record.shipping_address.clone().unwrap_or_default();
            batch.shipments.push(ShippingRow {
                platform,
                order_id: record.order_id.clone(),
                carrier: record.carrier.clone(),
                province: address.province,
                district: address.district,
                ward: address.ward,
            });
        }

        if let (Some(date), Some(key)) = (order_date, order_date_key) {
            if seen_dates.insert(key) {
                batch.dates.push(DateDimensionRow {
                    date_key: key,
                    calendar_date: date,
                    year: date.year(),
                    month: month_of(date),
                    day: day_of(date),
                });
            }
        }

        if let Some(code) = record.status_code {
            if seen_statuses.insert(code) {
                batch.statuses.push(StatusRow {
                    platform,
                    status_code: code,
                    status_name: record.status_name.clone(),
                });
            }
        }

        if seen_order_statuses.insert(record.order_id.clone()) {
            batch.order_statuses.push(OrderStatusRow {
                platform,
                order_id: record.order_id.clone(),
                lifecycle_state: state.as_str().to_owned(),
                status_code: record.status_code,
                status_name: record.status_name.clone(),
                partner_status: record.partner_status.clone(),
            });
            // Details ride along with the first occurrence of the order;
            // sequence numbers are unique within one record by construction.
            for (index, event) in record.tracking.iter().enumerate() {
                batch.order_status_details.push(OrderStatusDetailRow {
                    platform,
                    order_id: record.order_id.clone(),
                    sequence: sequence_number(index),
                    carrier_status: event.carrier_status.clone(),
                    note: event.note.clone(),
                    happened_at: event.happened_at,
                });
            }
        }
    }
    batch
}

/// Calendar date as a `yyyymmdd` integer: 2024-08-12 becomes 20240812.
#[must_use]
pub fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + month_of(date) * 100 + day_of(date)
}

fn month_of(date: NaiveDate) -> i32 {
    i32::try_from(date.month()).unwrap_or_default()
}

fn day_of(date: NaiveDate) -> i32 {
    i32::try_from(date.day()).unwrap_or_default()
}

fn sequence_number(index: usize) -> i32 {
    i32::try_from(index + 1).unwrap_or(i32::MAX)
}
