//! Warehouse row types and their table bindings.
//!
//! Each row struct mirrors one warehouse table. [`SinkTable`] carries the
//! table name, column list, and natural key so the Postgres sink can build
//! its bulk upserts generically; the column order and the bind order in
//! `push_fields` must line up.

use chrono::{DateTime, NaiveDate, Utc};
use orderhub_core::Platform;
use rust_decimal::Decimal;
use sqlx::Postgres;
use sqlx::query_builder::Separated;

/// Binding between a row struct and its warehouse table.
pub(crate) trait SinkTable {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];
    /// Natural key; conflict target of the upsert.
    const KEY: &'static [&'static str];

    /// Bind this row's fields in `COLUMNS` order.
    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>);
}

// =============================================================================
// Dimension rows
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRow {
    pub platform: Platform,
    pub customer_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl SinkTable for CustomerRow {
    const TABLE: &'static str = "customers";
    const COLUMNS: &'static [&'static str] = &["platform", "customer_id", "name", "phone", "email"];
    const KEY: &'static [&'static str] = &["platform", "customer_id"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.customer_id.clone())
            .push_bind(self.name.clone())
            .push_bind(self.phone.clone())
            .push_bind(self.email.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub platform: Platform,
    pub sku: String,
    /// Platform catalog id; empty string when the platform sent none, so
    /// the natural key never contains NULL.
    pub platform_product_id: String,
    pub name: Option<String>,
}

impl SinkTable for ProductRow {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &["platform", "sku", "platform_product_id", "name"];
    const KEY: &'static [&'static str] = &["platform", "sku", "platform_product_id"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.sku.clone())
            .push_bind(self.platform_product_id.clone())
            .push_bind(self.name.clone());
    }
}

/// Province/district/ward triple. Components default to empty strings so
/// the whole triple stays usable as a key.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographyRow {
    pub province: String,
    pub district: String,
    pub ward: String,
}

impl SinkTable for GeographyRow {
    const TABLE: &'static str = "geography";
    const COLUMNS: &'static [&'static str] = &["province", "district", "ward"];
    const KEY: &'static [&'static str] = &["province", "district", "ward"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.province.clone())
            .push_bind(self.district.clone())
            .push_bind(self.ward.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateDimensionRow {
    /// `yyyymmdd` as an integer, e.g. `20240812`.
    pub date_key: i32,
    pub calendar_date: NaiveDate,
    pub year: i32,
    pub month: i32,
    pub day: i32,
}

impl SinkTable for DateDimensionRow {
    const TABLE: &'static str = "date_dimension";
    const COLUMNS: &'static [&'static str] =
        &["date_key", "calendar_date", "year", "month", "day"];
    const KEY: &'static [&'static str] = &["date_key"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.date_key)
            .push_bind(self.calendar_date)
            .push_bind(self.year)
            .push_bind(self.month)
            .push_bind(self.day);
    }
}

/// One platform status code with its human-readable name.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub platform: Platform,
    pub status_code: i32,
    pub status_name: Option<String>,
}

impl SinkTable for StatusRow {
    const TABLE: &'static str = "status";
    const COLUMNS: &'static [&'static str] = &["platform", "status_code", "status_name"];
    const KEY: &'static [&'static str] = &["platform", "status_code"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.status_code)
            .push_bind(self.status_name.clone());
    }
}

// =============================================================================
// Order-grain rows
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub platform: Platform,
    pub order_id: String,
    pub order_number: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
    /// `yyyymmdd` key into `date_dimension`; `None` when the platform sent
    /// no order timestamp.
    pub date_key: Option<i32>,
    pub customer_id: Option<String>,
    pub cod_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_fee: Decimal,
    pub total_after_discount: Decimal,
    /// Sales channel tag, e.g. a shop or campaign label.
    pub source: Option<String>,
}

impl SinkTable for OrderRow {
    const TABLE: &'static str = "orders";
    const COLUMNS: &'static [&'static str] = &[
        "platform",
        "order_id",
        "order_number",
        "ordered_at",
        "date_key",
        "customer_id",
        "cod_amount",
        "tax_amount",
        "shipping_fee",
        "total_after_discount",
        "source",
    ];
    const KEY: &'static [&'static str] = &["platform", "order_id"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.order_id.clone())
            .push_bind(self.order_number.clone())
            .push_bind(self.ordered_at)
            .push_bind(self.date_key)
            .push_bind(self.customer_id.clone())
            .push_bind(self.cod_amount)
            .push_bind(self.tax_amount)
            .push_bind(self.shipping_fee)
            .push_bind(self.total_after_discount)
            .push_bind(self.source.clone());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItemRow {
    pub platform: Platform,
    pub order_id: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub return_quantity: i32,
}

impl SinkTable for OrderItemRow {
    const TABLE: &'static str = "order_items";
    const COLUMNS: &'static [&'static str] = &[
        "platform",
        "order_id",
        "sku",
        "quantity",
        "unit_price",
        "return_quantity",
    ];
    const KEY: &'static [&'static str] = &["platform", "order_id", "sku"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.order_id.clone())
            .push_bind(self.sku.clone())
            .push_bind(self.quantity)
            .push_bind(self.unit_price)
            .push_bind(self.return_quantity);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRow {
    pub platform: Platform,
    pub order_id: String,
    pub payment_method: Option<String>,
    pub cod_amount: Decimal,
}

impl SinkTable for PaymentRow {
    const TABLE: &'static str = "payments";
    const COLUMNS: &'static [&'static str] =
        &["platform", "order_id", "payment_method", "cod_amount"];
    const KEY: &'static [&'static str] = &["platform", "order_id"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.order_id.clone())
            .push_bind(self.payment_method.clone())
            .push_bind(self.cod_amount);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShippingRow {
    pub platform: Platform,
    pub order_id: String,
    pub carrier: Option<String>,
    pub province: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
}

impl SinkTable for ShippingRow {
    const TABLE: &'static str = "shipping";
    const COLUMNS: &'static [&'static str] =
        &["platform", "order_id", "carrier", "province", "district", "ward"];
    const KEY: &'static [&'static str] = &["platform", "order_id"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.order_id.clone())
            .push_bind(self.carrier.clone())
            .push_bind(self.province.clone())
            .push_bind(self.district.clone())
            .push_bind(self.ward.clone());
    }
}

/// Resolved lifecycle for one order, one row per order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusRow {
    pub platform: Platform,
    pub order_id: String,
    pub lifecycle_state: String,
    pub status_code: Option<i32>,
    pub status_name: Option<String>,
    pub partner_status: Option<String>,
}

impl SinkTable for OrderStatusRow {
    const TABLE: &'static str = "order_status";
    const COLUMNS: &'static [&'static str] = &[
        "platform",
        "order_id",
        "lifecycle_state",
        "status_code",
        "status_name",
        "partner_status",
    ];
    const KEY: &'static [&'static str] = &["platform", "order_id"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.order_id.clone())
            .push_bind(self.lifecycle_state.clone())
            .push_bind(self.status_code)
            .push_bind(self.status_name.clone())
            .push_bind(self.partner_status.clone());
    }
}

/// One tracking event, kept in carrier order via `sequence`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusDetailRow {
    pub platform: Platform,
    pub order_id: String,
    /// 1-based position within the order's tracking history.
    pub sequence: i32,
    pub carrier_status: String,
    pub note: Option<String>,
    pub happened_at: Option<DateTime<Utc>>,
}

impl SinkTable for OrderStatusDetailRow {
    const TABLE: &'static str = "order_status_detail";
    const COLUMNS: &'static [&'static str] = &[
        "platform",
        "order_id",
        "sequence",
        "carrier_status",
        "note",
        "happened_at",
    ];
    const KEY: &'static [&'static str] = &["platform", "order_id", "sequence"];

    fn push_fields(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(self.platform.as_str())
            .push_bind(self.order_id.clone())
            .push_bind(self.sequence)
            .push_bind(self.carrier_status.clone())
            .push_bind(self.note.clone())
            .push_bind(self.happened_at);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn check_consts<T: SinkTable>() {
        assert!(!T::TABLE.is_empty());
        assert!(!T::COLUMNS.is_empty());
        for key in T::KEY {
            assert!(T::COLUMNS.contains(key), "{}: key column {key} missing", T::TABLE);
        }
        let mut columns: Vec<_> = T::COLUMNS.to_vec();
        columns.sort_unstable();
        columns.dedup();
        assert_eq!(columns.len(), T::COLUMNS.len(), "{}: duplicate column", T::TABLE);
    }

    #[test]
    fn key_columns_exist_and_columns_are_unique() {
        check_consts::<CustomerRow>();
        check_consts::<OrderRow>();
        check_consts::<OrderItemRow>();
        check_consts::<ProductRow>();
        check_consts::<GeographyRow>();
        check_consts::<PaymentRow>();
        check_consts::<ShippingRow>();
        check_consts::<DateDimensionRow>();
        check_consts::<StatusRow>();
        check_consts::<OrderStatusRow>();
        check_consts::<OrderStatusDetailRow>();
    }

    #[test]
    fn geography_is_pure_key() {
        assert_eq!(GeographyRow::COLUMNS.len(), GeographyRow::KEY.len());
    }
}
