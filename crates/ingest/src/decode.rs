//! Wire envelope and per-platform order decoding.
//!
//! All three platforms answer with the same envelope shape (`code`/`status`,
//! `message`, `data.orders[]` plus paging hints), but each speaks its own
//! dialect inside an order payload: different field spellings and different
//! timestamp formats (Shopee sends unix seconds, Lazada naive
//! `YYYY-MM-DD HH:MM:SS` taken as UTC, TikTok Shop RFC 3339).
//!
//! Decoding is deliberately lenient: only a missing order id or an
//! unparseable order date disqualifies a record (it is skipped and reported
//! as a defect, the page continues). Malformed nested structures - items,
//! tracking, audit, refund - degrade to absent data, because the classifier
//! treats absence as "signal not present".

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use orderhub_core::{
    Address, AuditEntry, CustomerInfo, Financials, OrderItem, OrderRecord, Platform, RefundInfo,
    TrackingEvent,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::client::{PageResult, RecordDefect};

/// Envelope-level failures. These fail the whole page.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The platform answered with its failure code.
    #[error("platform reported code {code}: {message}")]
    FailureCode { code: i64, message: String },
    /// The body was not a decodable envelope.
    #[error("{0}")]
    Malformed(String),
}

/// Record-level defects. These skip one record, never the page.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not a parseable timestamp")]
    InvalidTimestamp(&'static str),
    #[error("order payload is not an object")]
    NotAnObject,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    code: Option<i64>,
    status: Option<i64>,
    message: Option<String>,
    data: Option<EnvelopeData>,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    orders: Vec<Value>,
    page: Option<i64>,
    total_pages: Option<i64>,
    has_next: Option<bool>,
}

/// Parse one response body into a [`PageResult`].
///
/// The envelope's `code` (or `status`, whichever is present) must equal the
/// platform's `success_code`; anything else is an error even when the HTTP
/// status was 200. A missing `data` object is an empty page, not an error.
///
/// # Errors
///
/// Returns [`EnvelopeError`] when the body is not an envelope or the
/// platform reported failure. Record-level problems do not error; they land
/// in [`PageResult::defects`].
pub fn parse_page(
    platform: Platform,
    success_code: i64,
    body: &str,
) -> Result<PageResult, EnvelopeError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

    let code = envelope
        .code
        .or(envelope.status)
        .ok_or_else(|| EnvelopeError::Malformed("envelope has neither `code` nor `status`".to_owned()))?;
    if code != success_code {
        return Err(EnvelopeError::FailureCode {
            code,
            message: envelope.message.unwrap_or_else(|| "no message".to_owned()),
        });
    }

    let data = envelope.data.unwrap_or_default();
    let returned_count = data.orders.len();

    let mut records = Vec::with_capacity(returned_count);
    let mut defects = Vec::new();
    for (position, payload) in data.orders.iter().enumerate() {
        match decode_order(platform, payload) {
            Ok(record) => records.push(record),
            Err(err) => {
                tracing::warn!(
                    platform = %platform,
                    position,
                    error = %err,
                    "skipping undecodable order record"
                );
                defects.push(RecordDefect {
                    position,
                    reason: err.to_string(),
                });
            }
        }
    }

    // Some platforms say has_next outright; the rest expose page/total_pages.
    let declared_has_next = data.has_next.or(match (data.page, data.total_pages) {
        (Some(page), Some(total)) => Some(page < total),
        _ => None,
    });

    Ok(PageResult {
        records,
        defects,
        declared_has_next,
        returned_count,
    })
}

/// Decode one order payload in the given platform's dialect.
///
/// # Errors
///
/// Returns [`DecodeError`] when the payload is not an object, lacks an order
/// id, or carries an unparseable order timestamp.
pub fn decode_order(platform: Platform, payload: &Value) -> Result<OrderRecord, DecodeError> {
    match platform {
        Platform::Shopee => shopee_order(payload),
        Platform::Lazada => lazada_order(payload),
        Platform::TiktokShop => tiktok_order(payload),
    }
}

// =============================================================================
// Platform dialects
// =============================================================================

fn shopee_order(payload: &Value) -> Result<OrderRecord, DecodeError> {
    let map = object(payload)?;
    let mut record = OrderRecord::new(Platform::Shopee, required_text(map, "order_sn")?);
    record.ordered_at = order_timestamp(map, "create_time", unix_ts)?;
    record.status_name = text(map, "order_status");
    record.status_code = int32(map, "status_code");
    record.partner_status = text(map, "partner_status");
    record.payment_method = text(map, "payment_method");
    record.carrier = text(map, "shipping_carrier");
    record.financials = Financials {
        cod_amount: money(map, "cod_amount"),
        tax_amount: money(map, "tax_amount"),
        shipping_fee: money(map, "shipping_fee"),
        total_after_discount: money(map, "total_after_discount"),
    };
    record.customer = customer(map.get("buyer"), "buyer_id", "username");
    record.shipping_address = address(map.get("recipient_address"));
    record.items = items(list(map, "item_list"), "item_sku", "item_id", "item_name", "unit_price");
    record.tracking = tracking_events(list(map, "tracking_history"), "update_time", unix_ts);
    record.audit = audit_entries(list(map, "audit_log"), "update_time", unix_ts);
    record.refund = refund(map.get("return_info"), "refund_amount", "reason");
    Ok(record)
}

fn lazada_order(payload: &Value) -> Result<OrderRecord, DecodeError> {
    let map = object(payload)?;
    let mut record = OrderRecord::new(Platform::Lazada, required_text(map, "order_id")?);
    record.order_number = text(map, "order_number");
    record.ordered_at = order_timestamp(map, "created_at", naive_ts)?;
    record.status_name = text(map, "status");
    record.status_code = int32(map, "status_code");
    record.partner_status = text(map, "delivery_status");
    record.payment_method = text(map, "payment_method");
    record.carrier = text(map, "delivery_provider");
    record.financials = Financials {
        cod_amount: money(map, "cod_amount"),
        tax_amount: money(map, "tax_amount"),
        shipping_fee: money(map, "shipping_amount"),
        total_after_discount: money(map, "grand_total"),
    };
    record.customer = customer(map.get("customer"), "customer_id", "name");
    record.shipping_address = address(map.get("address_shipping"));
    record.items = items(list(map, "order_items"), "sku", "product_id", "name", "item_price");
    record.tracking = tracking_events(list(map, "tracking_events"), "updated_at", naive_ts);
    record.audit = audit_entries(list(map, "change_history"), "changed_at", naive_ts);
    record.refund = refund(map.get("refund"), "amount", "reason");
    Ok(record)
}

fn tiktok_order(payload: &Value) -> Result<OrderRecord, DecodeError> {
    let map = object(payload)?;
    let mut record = OrderRecord::new(Platform::TiktokShop, required_text(map, "order_id")?);
    record.ordered_at = order_timestamp(map, "create_time", rfc3339_ts)?;
    record.status_name = text(map, "order_status");
    record.status_code = int32(map, "status_code");
    record.partner_status = text(map, "logistics_partner_status");
    record.carrier = text(map, "shipping_provider");

    // TikTok nests money under `payment`.
    if let Some(payment) = map.get("payment").and_then(Value::as_object) {
        record.payment_method = text(payment, "method");
        record.financials = Financials {
            cod_amount: money(payment, "cod"),
            tax_amount: money(payment, "tax"),
            shipping_fee: money(payment, "shipping_fee"),
            total_after_discount: money(payment, "total_after_discount"),
        };
    }

    record.customer = customer(map.get("buyer_info"), "user_id", "name");
    record.shipping_address = address(map.get("recipient_address"));
    record.items = items(
        list(map, "line_items"),
        "seller_sku",
        "product_id",
        "product_name",
        "sale_price",
    );
    record.tracking = tracking_events(list(map, "tracking"), "update_time", rfc3339_ts);
    record.audit = audit_entries(list(map, "audit_trail"), "change_time", rfc3339_ts);
    record.refund = refund(map.get("return_request"), "refund_total", "return_reason");
    Ok(record)
}

// =============================================================================
// Field helpers
// =============================================================================

fn object(value: &Value) -> Result<&Map<String, Value>, DecodeError> {
    value.as_object().ok_or(DecodeError::NotAnObject)
}

/// A non-empty string, accepting numbers too (Lazada sends numeric ids).
fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_text(map: &Map<String, Value>, key: &'static str) -> Result<String, DecodeError> {
    text(map, key).ok_or(DecodeError::MissingField(key))
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_owned(),
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(&raw)
        .ok()
        .or_else(|| Decimal::from_scientific(&raw).ok())
}

/// Money field: missing or malformed decodes to zero.
fn money(map: &Map<String, Value>, key: &str) -> Decimal {
    map.get(key).and_then(decimal_value).unwrap_or_default()
}

fn decimal_opt(map: &Map<String, Value>, key: &str) -> Option<Decimal> {
    map.get(key).and_then(decimal_value)
}

fn int64(map: &Map<String, Value>, key: &str) -> Option<i64> {
    match map.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn int32(map: &Map<String, Value>, key: &str) -> Option<i32> {
    int64(map, key).and_then(|n| i32::try_from(n).ok())
}

fn flag(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn list<'a>(map: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    map.get(key).and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

// =============================================================================
// Timestamps
// =============================================================================

fn unix_ts(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_i64()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

fn naive_ts(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S").ok())
        .map(|naive| naive.and_utc())
}

fn rfc3339_ts(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// The order's own timestamp: absent is fine, unparseable is a defect.
fn order_timestamp(
    map: &Map<String, Value>,
    key: &'static str,
    parse: fn(&Value) -> Option<DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, DecodeError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse(value)
            .map(Some)
            .ok_or(DecodeError::InvalidTimestamp(key)),
    }
}

// =============================================================================
// Nested structures (lenient: malformed entries are dropped)
// =============================================================================

fn customer(value: Option<&Value>, id_key: &str, name_key: &str) -> Option<CustomerInfo> {
    let map = value?.as_object()?;
    Some(CustomerInfo {
        customer_id: text(map, id_key)?,
        name: text(map, name_key),
        phone: text(map, "phone"),
        email: text(map, "email"),
    })
}

fn address(value: Option<&Value>) -> Option<Address> {
    let map = value?.as_object()?;
    let parsed = Address {
        province: text(map, "province"),
        district: text(map, "district"),
        ward: text(map, "ward"),
    };
    (parsed != Address::default()).then_some(parsed)
}

fn items(
    entries: &[Value],
    sku_key: &str,
    product_key: &str,
    name_key: &str,
    price_key: &str,
) -> Vec<OrderItem> {
    entries
        .iter()
        .filter_map(|entry| {
            let map = entry.as_object()?;
            Some(OrderItem {
                sku: text(map, sku_key)?,
                platform_product_id: text(map, product_key),
                name: text(map, name_key),
                quantity: int32(map, "quantity").unwrap_or(0),
                unit_price: money(map, price_key),
                return_quantity: int32(map, "return_quantity").unwrap_or(0),
            })
        })
        .collect()
}

fn tracking_events(
    entries: &[Value],
    ts_key: &str,
    parse: fn(&Value) -> Option<DateTime<Utc>>,
) -> Vec<TrackingEvent> {
    entries
        .iter()
        .filter_map(|entry| {
            let map = entry.as_object()?;
            Some(TrackingEvent {
                carrier_status: text(map, "status")?,
                note: text(map, "description"),
                happened_at: map.get(ts_key).and_then(parse),
            })
        })
        .collect()
}

fn audit_entries(
    entries: &[Value],
    ts_key: &str,
    parse: fn(&Value) -> Option<DateTime<Utc>>,
) -> Vec<AuditEntry> {
    entries
        .iter()
        .filter_map(|entry| {
            let map = entry.as_object()?;
            Some(AuditEntry {
                field: text(map, "field")?,
                old_value: text(map, "old_value"),
                new_value: text(map, "new_value"),
                changed_at: map.get(ts_key).and_then(parse),
            })
        })
        .collect()
}

fn refund(value: Option<&Value>, amount_key: &str, reason_key: &str) -> Option<RefundInfo> {
    let map = value?.as_object()?;
    Some(RefundInfo {
        is_returned: flag(map, "is_returned").unwrap_or(false),
        amount: decimal_opt(map, amount_key),
        reason: text(map, reason_key),
    })
}
