//! Order lifecycle classification.
//!
//! Turns the raw signals on an [`OrderRecord`] into a single
//! [`LifecycleState`]. Classification is pure: it looks only at the record,
//! never at the clock or any external state, so the same record always
//! classifies the same way.

pub mod rules;
pub mod signals;

use orderhub_core::{LifecycleState, OrderRecord};
pub use rules::{Intent, Rule, rules_for};

/// Resolve a record's lifecycle state.
///
/// Delivery evidence is the master signal: a return on top of a delivered
/// parcel is a post-delivery return no matter which rule raised it. Return
/// intent beats cancel intent, cancel beats plain delivery, and a record
/// with no signals at all stays active.
#[must_use]
pub fn classify(record: &OrderRecord) -> LifecycleState {
    let rules = rules_for(record.platform);
    let matched_return = rules
        .iter()
        .find(|rule| rule.intent == Intent::Return && (rule.applies)(record));
    let matched_cancel = rules
        .iter()
        .find(|rule| rule.intent == Intent::Cancel && (rule.applies)(record));
    let delivered = signals::has_delivery_evidence(record);

    let state = if matched_return.is_some() {
        if delivered {
            LifecycleState::ReturnedPostDelivery
        } else {
            LifecycleState::ReturningPreDelivery
        }
    } else if matched_cancel.is_some() {
        LifecycleState::Cancelled
    } else if delivered {
        LifecycleState::Delivered
    } else {
        LifecycleState::Active
    };

    tracing::trace!(
        platform = %record.platform,
        order_id = %record.order_id,
        state = %state,
        return_rule = matched_return.map(|r| r.name),
        cancel_rule = matched_cancel.map(|r| r.name),
        delivered,
        "classified order"
    );
    state
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use orderhub_core::{AuditEntry, OrderItem, Platform, RefundInfo, TrackingEvent};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::*;

    fn base(platform: Platform) -> OrderRecord {
        OrderRecord::new(platform, "2408CLS001")
    }

    fn delivered_event() -> TrackingEvent {
        TrackingEvent {
            carrier_status: "delivered".to_owned(),
            note: None,
            happened_at: None,
        }
    }

    fn returned_item() -> OrderItem {
        OrderItem {
            sku: "TS-RED-M".to_owned(),
            platform_product_id: None,
            name: None,
            quantity: 1,
            unit_price: Decimal::ZERO,
            return_quantity: 1,
        }
    }

    #[test]
    fn no_signals_stays_active() {
        let record = base(Platform::Shopee);
        assert_eq!(classify(&record), LifecycleState::Active);
    }

    #[test]
    fn delivery_evidence_alone_is_delivered() {
        let mut record = base(Platform::Lazada);
        record.tracking.push(delivered_event());
        assert_eq!(classify(&record), LifecycleState::Delivered);
    }

    #[test]
    fn return_without_delivery_is_pre_delivery() {
        let mut record = base(Platform::TiktokShop);
        record.items.push(returned_item());
        assert_eq!(classify(&record), LifecycleState::ReturningPreDelivery);
    }

    #[test]
    fn return_after_delivery_is_post_delivery() {
        let mut record = base(Platform::Shopee);
        record.tracking.push(delivered_event());
        record.refund = Some(RefundInfo {
            is_returned: true,
            amount: Some(Decimal::from(150)),
            reason: Some("wrong size".to_owned()),
        });
        assert_eq!(classify(&record), LifecycleState::ReturnedPostDelivery);
    }

    #[test]
    fn item_level_return_on_a_delivered_parcel_is_post_delivery() {
        let mut record = base(Platform::Lazada);
        let mut item = returned_item();
        item.return_quantity = 2;
        record.items.push(item);
        record.tracking.push(delivered_event());
        assert_eq!(classify(&record), LifecycleState::ReturnedPostDelivery);
    }

    #[test]
    fn return_intent_beats_cancel_intent() {
        let mut record = base(Platform::Shopee);
        record.status_code = Some(4);
        record.items.push(returned_item());
        assert_eq!(classify(&record), LifecycleState::ReturningPreDelivery);
    }

    #[test]
    fn cancel_code_beats_delivery_evidence() {
        let mut record = base(Platform::TiktokShop);
        record.status_code = Some(140);
        record.tracking.push(delivered_event());
        assert_eq!(classify(&record), LifecycleState::Cancelled);
    }

    #[test]
    fn shopee_return_to_sender_classifies_as_return() {
        let mut record = base(Platform::Shopee);
        record.status_code = Some(4);
        record.audit.push(AuditEntry {
            field: "status".to_owned(),
            old_value: Some("shipped".to_owned()),
            new_value: Some("cancelled".to_owned()),
            changed_at: None,
        });
        // The cancel code is present too, but the shipped parcel coming
        // back is a return, not a plain cancellation.
        assert_eq!(classify(&record), LifecycleState::ReturningPreDelivery);
    }

    #[test]
    fn lazada_cod_drop_after_shipment_classifies_as_return() {
        use chrono::TimeZone;
        let mut record = base(Platform::Lazada);
        record.tracking.push(TrackingEvent {
            carrier_status: "shipped".to_owned(),
            note: None,
            happened_at: Some(chrono::Utc.timestamp_opt(1_000, 0).unwrap()),
        });
        record.audit.push(AuditEntry {
            field: "cod".to_owned(),
            old_value: Some("415000".to_owned()),
            new_value: Some("0".to_owned()),
            changed_at: Some(chrono::Utc.timestamp_opt(2_000, 0).unwrap()),
        });
        assert_eq!(classify(&record), LifecycleState::ReturningPreDelivery);
    }

    #[test]
    fn undelivered_status_does_not_upgrade_a_return() {
        let mut record = base(Platform::Shopee);
        record.items.push(returned_item());
        record.tracking.push(TrackingEvent {
            carrier_status: "undelivered".to_owned(),
            note: None,
            happened_at: None,
        });
        assert_eq!(classify(&record), LifecycleState::ReturningPreDelivery);
    }

    fn arb_platform() -> impl Strategy<Value = Platform> {
        prop_oneof![
            Just(Platform::Shopee),
            Just(Platform::Lazada),
            Just(Platform::TiktokShop),
        ]
    }

    proptest! {
        #[test]
        fn delivery_evidence_decides_the_return_flavor(
            platform in arb_platform(),
            return_quantity in 0i32..3,
            refund_returned in proptest::bool::ANY,
            status_code in proptest::option::of(prop_oneof![
                Just(4), Just(5), Just(108), Just(111), Just(140),
            ]),
            status_name in proptest::option::of(prop_oneof![
                Just("returning"), Just("completed"), Just("processing"),
            ]),
            delivered in proptest::bool::ANY,
        ) {
            let mut record = base(platform);
            record.status_code = status_code;
            record.status_name = status_name.map(str::to_owned);
            if return_quantity > 0 {
                let mut item = returned_item();
                item.return_quantity = return_quantity;
                record.items.push(item);
            }
            if refund_returned {
                record.refund = Some(RefundInfo {
                    is_returned: true,
                    amount: None,
                    reason: None,
                });
            }
            if delivered {
                record.tracking.push(delivered_event());
            }

            let state = classify(&record);
            prop_assert_eq!(classify(&record), state);
            if delivered {
                prop_assert_ne!(state, LifecycleState::ReturningPreDelivery);
            } else {
                prop_assert_ne!(state, LifecycleState::Delivered);
                prop_assert_ne!(state, LifecycleState::ReturnedPostDelivery);
            }
        }
    }
}
