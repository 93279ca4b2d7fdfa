//! Network-quality signal sources.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::network::NetworkSample;
use crate::error::Result;

/// Live connection-quality API, when the host environment has one.
pub trait ConnectionInfoSource: Send + Sync {
    /// Current reading, or `None` when the API is unavailable.
    fn sample(&self) -> Option<NetworkSample>;
}

/// Round-trip latency probe, the always-on fallback signal.
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    async fn probe(&self) -> Result<Duration>;
}
