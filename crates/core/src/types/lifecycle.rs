//! Order lifecycle states.

use serde::{Deserialize, Serialize};

/// The business lifecycle state assigned to an order during ingestion.
///
/// Exactly one state per order per run. Return intent beats cancel intent,
/// and delivery evidence decides which side of delivery a return falls on;
/// the classifier in the ingest crate owns that precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// In progress: no delivery evidence and no return or cancel intent.
    #[default]
    Active,
    /// Delivered with no return or cancel intent observed.
    Delivered,
    /// Cancelled before any delivery took place.
    Cancelled,
    /// A return is underway and the order never reached the customer.
    ReturningPreDelivery,
    /// The customer received the order and is sending it back.
    ReturnedPostDelivery,
}

impl LifecycleState {
    /// Stable snake_case identifier stored in warehouse rows.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::ReturningPreDelivery => "returning_pre_delivery",
            Self::ReturnedPostDelivery => "returned_post_delivery",
        }
    }

}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
