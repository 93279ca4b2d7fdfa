//! Outbound adapters: concrete implementations of the ports for HTTP,
//! persistence, and telemetry.

pub mod http;
pub mod store;
pub mod telemetry;
