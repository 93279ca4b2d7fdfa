//! Manual network signal sources for monitor and scheduler tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::network::NetworkSample;
use crate::error::{Error, PreloadError, Result};
use crate::port::probe::{ConnectionInfoSource, LatencyProbe};

/// Connection-info source whose reading is set by the test.
#[derive(Default)]
pub struct ManualConnection {
    sample: Mutex<Option<NetworkSample>>,
}

impl ManualConnection {
    pub fn new(sample: NetworkSample) -> Self {
        Self {
            sample: Mutex::new(Some(sample)),
        }
    }

    pub fn set(&self, sample: NetworkSample) {
        *self.sample.lock() = Some(sample);
    }

    /// Simulate the API going away.
    pub fn clear(&self) {
        *self.sample.lock() = None;
    }
}

impl ConnectionInfoSource for ManualConnection {
    fn sample(&self) -> Option<NetworkSample> {
        self.sample.lock().clone()
    }
}

/// Latency probe with pre-loaded round-trip results.
///
/// Each call pops the next scripted result; when exhausted, it returns the
/// default round-trip time.
pub struct ScriptedProbe {
    results: Mutex<VecDeque<Result<Duration>>>,
    default_rtt: Duration,
    calls: AtomicU32,
}

impl ScriptedProbe {
    pub fn new(default_rtt: Duration) -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            default_rtt,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_results(self, results: Vec<Result<Duration>>) -> Self {
        *self.results.lock() = results.into();
        self
    }

    pub fn push_rtt(&self, rtt: Duration) {
        self.results.lock().push_back(Ok(rtt));
    }

    pub fn push_failure(&self, reason: &str) {
        self.results.lock().push_back(Err(Error::from(
            PreloadError::FetchFailed {
                url: "probe".to_string(),
                reason: reason.to_string(),
            },
        )));
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LatencyProbe for ScriptedProbe {
    async fn probe(&self) -> Result<Duration> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .pop_front()
            .unwrap_or(Ok(self.default_rtt))
    }
}
