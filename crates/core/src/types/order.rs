//! The canonical order record.
//!
//! Every platform's payload decodes into [`OrderRecord`]. Fields a platform
//! does not provide stay `None`/empty; downstream stages treat missing data
//! as an absent signal rather than an error.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::platform::Platform;

/// A single order in canonical form, independent of platform dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub platform: Platform,
    /// Platform-scoped order identifier. The only mandatory field.
    pub order_id: String,
    /// Human-facing order number, when distinct from the id.
    pub order_number: Option<String>,
    pub ordered_at: Option<DateTime<Utc>>,
    /// Numeric platform status code, used for cancel-code matching and the
    /// status dimension.
    pub status_code: Option<i32>,
    /// Platform status display name, e.g. `"READY_TO_SHIP"`.
    pub status_name: Option<String>,
    /// Status text reported by a third-party logistics partner, when the
    /// platform exposes one separately from its own status.
    pub partner_status: Option<String>,
    /// Sales channel tag, e.g. a storefront or campaign name.
    pub source: Option<String>,
    pub customer: Option<CustomerInfo>,
    pub shipping_address: Option<Address>,
    pub financials: Financials,
    pub payment_method: Option<String>,
    pub carrier: Option<String>,
    pub items: Vec<OrderItem>,
    /// Carrier tracking events, oldest first as decoded.
    pub tracking: Vec<TrackingEvent>,
    /// Platform audit trail entries (field-level change history).
    pub audit: Vec<AuditEntry>,
    pub refund: Option<RefundInfo>,
}

impl OrderRecord {
    /// A minimal record for the given platform and order id. Every other
    /// field starts absent/empty.
    #[must_use]
    pub fn new(platform: Platform, order_id: impl Into<String>) -> Self {
        Self {
            platform,
            order_id: order_id.into(),
            order_number: None,
            ordered_at: None,
            status_code: None,
            status_name: None,
            partner_status: None,
            source: None,
            customer: None,
            shipping_address: None,
            financials: Financials::default(),
            payment_method: None,
            carrier: None,
            items: Vec::new(),
            tracking: Vec::new(),
            audit: Vec::new(),
            refund: None,
        }
    }

    /// Whether this record is a placeholder rather than a real order.
    ///
    /// Platforms occasionally emit padding or test records; these are
    /// filtered out before buffering and counted, never persisted.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        let id = self.order_id.trim();
        id.is_empty() || id == "0" || id.to_ascii_uppercase().starts_with("TEST")
    }
}

/// Buyer identity attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    /// Platform-scoped customer identifier.
    pub customer_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Delivery address, at the granularity the geography dimension needs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub province: Option<String>,
    pub district: Option<String>,
    pub ward: Option<String>,
}

/// Money fields of an order. Missing wire values decode to zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Financials {
    /// Cash-on-delivery amount to collect.
    pub cod_amount: Decimal,
    pub tax_amount: Decimal,
    pub shipping_fee: Decimal,
    pub total_after_discount: Decimal,
}

/// One purchased line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub sku: String,
    pub platform_product_id: Option<String>,
    pub name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Units the buyer asked to send back. Nonzero is return intent.
    pub return_quantity: i32,
}

/// One carrier tracking event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// Carrier status code or phrase, as reported.
    pub carrier_status: String,
    pub note: Option<String>,
    pub happened_at: Option<DateTime<Utc>>,
}

/// One field-level change from the platform's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Which field changed, e.g. `"status"` or `"cod"`.
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_at: Option<DateTime<Utc>>,
}

/// Refund/return request details, when the platform reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundInfo {
    /// Platform marked the goods as returned (or return-approved).
    pub is_returned: bool,
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_zero_ids_are_placeholders() {
        assert!(OrderRecord::new(Platform::Shopee, "").is_placeholder());
        assert!(OrderRecord::new(Platform::Shopee, "   ").is_placeholder());
        assert!(OrderRecord::new(Platform::Shopee, "0").is_placeholder());
    }

    #[test]
    fn test_prefixed_ids_are_placeholders() {
        assert!(OrderRecord::new(Platform::Lazada, "TEST-123").is_placeholder());
        assert!(OrderRecord::new(Platform::Lazada, "test_order_1").is_placeholder());
    }

    #[test]
    fn real_ids_are_not_placeholders() {
        assert!(!OrderRecord::new(Platform::TiktokShop, "576461413038785752").is_placeholder());
        // An id merely containing "test" is fine; only the prefix matters.
        assert!(!OrderRecord::new(Platform::Shopee, "2408TESTABLE").is_placeholder());
    }

    #[test]
    fn new_record_has_zeroed_financials() {
        let record = OrderRecord::new(Platform::Shopee, "240101ABCDEF");
        assert_eq!(record.financials, Financials::default());
        assert!(record.items.is_empty());
        assert!(record.refund.is_none());
    }
}
