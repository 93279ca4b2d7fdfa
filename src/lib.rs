//! Microweave - micro-frontend orchestration core.
//!
//! This crate coordinates independently deployed micro applications inside a
//! host shell: it drives each application through an explicit lifecycle state
//! machine, shares versioned global state between them, and speculatively
//! warms the applications a user is likely to visit next.
//!
//! # Architecture
//!
//! Hexagonal: pure domain types at the center, application services around
//! them, and ports at the edges for everything host-specific.
//!
//! - **`domain`** - Descriptors, the lifecycle status graph, behavior records
//!   and prediction tables, network classification, preload tasks and cache
//! - **`app`** - The services: [`app::Orchestrator`] facade,
//!   [`app::registry::AppRegistry`] lifecycle engine,
//!   [`app::state_bus::GlobalStateBus`],
//!   [`app::analyzer::BehaviorAnalyzer`],
//!   [`app::monitor::NetworkMonitor`], and
//!   [`app::scheduler::PreloadScheduler`]
//! - **`port`** - Traits the host implements: module loading, resource
//!   fetching, network signals, key-value storage, telemetry
//! - **`adapter`** - Batteries-included port implementations (HTTP fetcher
//!   and probe, in-memory and JSON-file stores, no-op telemetry)
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with validation and logging setup
//! - [`error`] - Structured error types for the crate
//! - [`testkit`] - Scripted port implementations (requires `testkit` feature)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use microweave::app::Orchestrator;
//! use microweave::config::Config;
//! # use microweave::port::loader::ModuleLoader;
//! # async fn run(loader: Arc<dyn ModuleLoader>) -> microweave::error::Result<()> {
//!
//! let mut config = Config::default();
//! config.network.probe_url = "https://cdn.example.com/ping".into();
//!
//! let orchestrator = Orchestrator::builder(config)
//!     .loader(loader)
//!     .build()?;
//! orchestrator.start().await;
//! orchestrator.route_changed("/orders");
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use app::{Orchestrator, OrchestratorBuilder};
pub use config::Config;
pub use error::{Error, Result};
