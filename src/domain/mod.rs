//! Pure domain types: no I/O, no clocks, no locks.

pub mod app;
pub mod behavior;
pub mod network;
pub mod preload;
pub mod state;

pub use app::{AppDescriptor, AppStatus, Props};
pub use behavior::{BehaviorLog, BehaviorRecord, PredictionTable};
pub use network::{EffectiveType, NetworkSample, NetworkStatus, RttWindow};
pub use preload::{PreloadCache, PreloadTask, Priority, TaskStatus};
pub use state::StateSnapshot;
