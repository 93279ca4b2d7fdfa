//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`loader`] — Scripted [`ModuleLoader`](crate::port::loader::ModuleLoader)
//!   and module implementations with a shared call journal.
//! - [`net`] — Manual connection-info source and scripted latency probe.
//! - [`fetcher`] — Scripted resource fetcher for preload tests.
//! - [`host`] — Recording container host and collecting telemetry sink.
//! - [`domain`] — Builders for descriptors and connection samples.

pub mod domain;
pub mod fetcher;
pub mod host;
pub mod loader;
pub mod net;
