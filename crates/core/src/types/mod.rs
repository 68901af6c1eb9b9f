//! Core types for orderhub.
//!
//! This module provides the canonical domain vocabulary: which platforms
//! exist, what lifecycle states an order can be in, and the normalized
//! order record every platform decodes into.

pub mod lifecycle;
pub mod order;
pub mod platform;

pub use lifecycle::LifecycleState;
pub use order::{
    Address, AuditEntry, CustomerInfo, Financials, OrderItem, OrderRecord, RefundInfo,
    TrackingEvent,
};
pub use platform::Platform;
