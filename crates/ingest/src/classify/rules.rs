//! Per-platform classification rule tables.
//!
//! A rule pairs a named predicate with the intent it establishes. The
//! tables are plain data so adding a platform quirk is one line, and the
//! matched rule name flows into trace logs for postmortems.

use orderhub_core::{OrderRecord, Platform};

use super::signals;

/// What a matched rule says the seller or buyer wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Goods are coming back; delivery evidence decides pre vs post.
    Return,
    /// The order was called off.
    Cancel,
}

pub struct Rule {
    pub name: &'static str,
    pub intent: Intent,
    pub applies: fn(&OrderRecord) -> bool,
}

/// Shopee status codes 4 (`CANCELLED`) and 5 (`TO_RETURN` after cancel
/// review) both land in the cancel bucket.
const SHOPEE_CANCEL_CODES: &[i32] = &[4, 5];
/// Lazada reports cancellation as status code 108.
const LAZADA_CANCEL_CODES: &[i32] = &[108];
/// TikTok Shop order status 140 is `CANCELLED`.
const TIKTOK_CANCEL_CODES: &[i32] = &[140];

const SHOPEE_RULES: &[Rule] = &[
    Rule {
        name: "item_return_quantity",
        intent: Intent::Return,
        applies: signals::item_return_requested,
    },
    Rule {
        name: "status_text_return",
        intent: Intent::Return,
        applies: signals::status_text_indicates_return,
    },
    Rule {
        name: "refund_marked_returned",
        intent: Intent::Return,
        applies: signals::refund_marked_returned,
    },
    // Shopee never emits an explicit return-to-sender status; the audit
    // trail flipping shipped -> cancelled is how it shows up.
    Rule {
        name: "shipped_then_cancelled",
        intent: Intent::Return,
        applies: signals::audit_shipped_then_cancelled,
    },
    Rule {
        name: "cancel_status_code",
        intent: Intent::Cancel,
        applies: shopee_cancel_code,
    },
];

const LAZADA_RULES: &[Rule] = &[
    Rule {
        name: "item_return_quantity",
        intent: Intent::Return,
        applies: signals::item_return_requested,
    },
    Rule {
        name: "status_text_return",
        intent: Intent::Return,
        applies: signals::status_text_indicates_return,
    },
    Rule {
        name: "refund_marked_returned",
        intent: Intent::Return,
        applies: signals::refund_marked_returned,
    },
    // Lazada quietly zeroes the collectable COD when a parcel bounces;
    // the order status often still reads as shipped.
    Rule {
        name: "cod_reduced_after_shipment",
        intent: Intent::Return,
        applies: signals::cod_reduced_after_shipment,
    },
    Rule {
        name: "cancel_status_code",
        intent: Intent::Cancel,
        applies: lazada_cancel_code,
    },
];

const TIKTOK_RULES: &[Rule] = &[
    Rule {
        name: "item_return_quantity",
        intent: Intent::Return,
        applies: signals::item_return_requested,
    },
    Rule {
        name: "status_text_return",
        intent: Intent::Return,
        applies: signals::status_text_indicates_return,
    },
    Rule {
        name: "refund_marked_returned",
        intent: Intent::Return,
        applies: signals::refund_marked_returned,
    },
    Rule {
        name: "cancel_status_code",
        intent: Intent::Cancel,
        applies: tiktok_cancel_code,
    },
];

#[must_use]
pub const fn rules_for(platform: Platform) -> &'static [Rule] {
    match platform {
        Platform::Shopee => SHOPEE_RULES,
        Platform::Lazada => LAZADA_RULES,
        Platform::TiktokShop => TIKTOK_RULES,
    }
}

fn shopee_cancel_code(record: &OrderRecord) -> bool {
    signals::has_cancel_code(record, SHOPEE_CANCEL_CODES)
}

fn lazada_cancel_code(record: &OrderRecord) -> bool {
    signals::has_cancel_code(record, LAZADA_CANCEL_CODES)
}

fn tiktok_cancel_code(record: &OrderRecord) -> bool {
    signals::has_cancel_code(record, TIKTOK_CANCEL_CODES)
}
