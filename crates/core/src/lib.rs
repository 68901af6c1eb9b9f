//! Orderhub Core - Shared domain types.
//!
//! This crate provides the types shared by all orderhub components:
//! - `ingest` - The order ingestion pipeline
//! - `cli` - Command-line entrypoint for runs and health checks
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Platforms, lifecycle states, and the canonical order record

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
