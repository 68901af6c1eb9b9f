//! Order ingestion library.
//!
//! Pulls completed orders from the three supported e-commerce platforms
//! (Shopee, Lazada, TikTok Shop), classifies each order's lifecycle, and
//! persists the results into the warehouse tables.
//!
//! # Pipeline
//!
//! One [`orchestrator::Orchestrator`] run spawns a pipeline per platform.
//! Each pipeline pages through its platform API ([`client::PlatformClient`]),
//! buffers valid records ([`buffer::Buffer`]), and flushes them in
//! capacity-sized batches ([`flush::FlushCoordinator`]) into a shared
//! [`sink::PersistenceSink`]. Per-platform results merge into one
//! [`summary::RunSummary`]; a failed platform never takes its siblings down.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod buffer;
pub mod classify;
pub mod client;
pub mod config;
pub mod decode;
pub mod driver;
pub mod flush;
pub mod orchestrator;
pub mod sink;
pub mod summary;
