//! Boundary traits for the host environment's collaborators.
//!
//! The core never talks to the DOM, the network, or local storage directly;
//! the host installs implementations of these ports once at composition time.

pub mod fetcher;
pub mod loader;
pub mod probe;
pub mod storage;
pub mod telemetry;

pub use fetcher::ResourceFetcher;
pub use loader::{AppModule, ContainerHost, ModuleLoader, MountProps};
pub use probe::{ConnectionInfoSource, LatencyProbe};
pub use storage::KeyValueStore;
pub use telemetry::{ErrorReport, TelemetryEvent, TelemetrySink};
