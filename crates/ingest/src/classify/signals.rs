//! Evidence extraction from order records.
//!
//! Every function here is a pure predicate over an [`OrderRecord`]: no
//! clock, no I/O, no platform branches. Missing or malformed data always
//! reads as "signal absent", never as an error.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use orderhub_core::OrderRecord;
use rust_decimal::Decimal;

/// Carrier statuses that prove delivery on their own. Matched exactly, so
/// `undelivered` and `delivery_failed` can never count.
const DELIVERED_STATUSES: &[&str] = &["delivered", "delivery_successful"];

/// Free-text delivery marker, matched as a whole phrase.
const DELIVERED_TEXT_MARKER: &str = "delivered successfully";

/// Carrier statuses that show the parcel left the seller.
const SHIPMENT_STATUSES: &[&str] = &["shipped", "in_transit", "picked_up", "out_for_delivery"];

/// Did the carrier confirm the customer received the parcel?
///
/// This is the master signal for classification: it decides whether a
/// return is pre- or post-delivery.
#[must_use]
pub fn has_delivery_evidence(record: &OrderRecord) -> bool {
    record.tracking.iter().any(|event| {
        let status = event.carrier_status.to_lowercase();
        DELIVERED_STATUSES.contains(&status.as_str())
            || status.contains(DELIVERED_TEXT_MARKER)
            || event
                .note
                .as_deref()
                .is_some_and(|note| note.to_lowercase().contains(DELIVERED_TEXT_MARKER))
    })
}

/// Any line item with a nonzero return quantity.
#[must_use]
pub fn item_return_requested(record: &OrderRecord) -> bool {
    record.items.iter().any(|item| item.return_quantity > 0)
}

/// Platform or logistics-partner status text that spells out a return.
#[must_use]
pub fn status_text_indicates_return(record: &OrderRecord) -> bool {
    [record.status_name.as_deref(), record.partner_status.as_deref()]
        .into_iter()
        .flatten()
        .any(|status| {
            let status = status.to_lowercase();
            status.contains("returning") || status.contains("returned")
        })
}

/// The platform's refund payload says the goods are coming back.
#[must_use]
pub fn refund_marked_returned(record: &OrderRecord) -> bool {
    record.refund.as_ref().is_some_and(|refund| refund.is_returned)
}

/// Audit trail shows a `shipped` to `cancelled` status flip. Once a parcel
/// has shipped, a cancellation means it is being sent back to the seller.
#[must_use]
pub fn audit_shipped_then_cancelled(record: &OrderRecord) -> bool {
    record.audit.iter().any(|entry| {
        entry.field.eq_ignore_ascii_case("status")
            && value_matches(entry.old_value.as_deref(), "shipped")
            && value_matches(entry.new_value.as_deref(), "cancelled")
    })
}

/// The COD amount dropped after the parcel shipped - collectable cash only
/// shrinks in flight when goods are refused or sent back.
#[must_use]
pub fn cod_reduced_after_shipment(record: &OrderRecord) -> bool {
    let Some(shipped_at) = first_shipment_time(record) else {
        return false;
    };
    record.audit.iter().any(|entry| {
        if !entry.field.eq_ignore_ascii_case("cod") {
            return false;
        }
        let Some(changed_at) = entry.changed_at else {
            return false;
        };
        if changed_at < shipped_at {
            return false;
        }
        match (
            parse_amount(entry.old_value.as_deref()),
            parse_amount(entry.new_value.as_deref()),
        ) {
            (Some(old), Some(new)) => new < old,
            _ => false,
        }
    })
}

/// The platform's numeric status code is one of its cancel codes.
#[must_use]
pub fn has_cancel_code(record: &OrderRecord, codes: &[i32]) -> bool {
    record.status_code.is_some_and(|code| codes.contains(&code))
}

fn first_shipment_time(record: &OrderRecord) -> Option<DateTime<Utc>> {
    record
        .tracking
        .iter()
        .filter(|event| SHIPMENT_STATUSES.contains(&event.carrier_status.to_lowercase().as_str()))
        .filter_map(|event| event.happened_at)
        .min()
}

fn value_matches(value: Option<&str>, expected: &str) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case(expected))
}

fn parse_amount(value: Option<&str>) -> Option<Decimal> {
    value.and_then(|v| Decimal::from_str(v.trim()).ok())
}
