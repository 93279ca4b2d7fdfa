//! Connection-quality samples and the fast/slow classifier.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Binary connection quality driving preload admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Fast,
    Slow,
}

/// Effective connection type as reported by a connection-quality API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

/// One reading from the live connection-quality API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    pub effective_type: EffectiveType,
    pub downlink_mbps: f64,
    pub rtt_ms: u32,
    pub save_data: bool,
}

impl NetworkSample {
    /// Classification rule: save-data mode or anything below solid 4g-class
    /// service counts as slow.
    pub fn classify(&self) -> NetworkStatus {
        if self.save_data
            || matches!(self.effective_type, EffectiveType::Slow2g | EffectiveType::TwoG)
        {
            return NetworkStatus::Slow;
        }
        if matches!(self.effective_type, EffectiveType::ThreeG)
            || self.downlink_mbps < 1.5
            || self.rtt_ms > 300
        {
            return NetworkStatus::Slow;
        }
        NetworkStatus::Fast
    }
}

/// Rolling window of probe round-trip times for the fallback classifier.
#[derive(Debug, Clone)]
pub struct RttWindow {
    samples: VecDeque<Duration>,
    cap: usize,
}

impl RttWindow {
    pub fn new(cap: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, rtt: Duration) {
        self.samples.push_back(rtt);
        while self.samples.len() > self.cap {
            self.samples.pop_front();
        }
    }

    pub fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    /// Fallback classification; `None` until a first sample lands.
    pub fn classify(&self, slow_above: Duration) -> Option<NetworkStatus> {
        self.average().map(|avg| {
            if avg > slow_above {
                NetworkStatus::Slow
            } else {
                NetworkStatus::Fast
            }
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
