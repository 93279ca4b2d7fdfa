//! Network-quality monitoring: live connection info plus latency probes.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::domain::network::{NetworkSample, NetworkStatus, RttWindow};
use crate::port::probe::{ConnectionInfoSource, LatencyProbe};

/// Classifies the connection as fast or slow.
///
/// The live connection-info source is authoritative when present; the probe
/// window is the always-on fallback. Status changes are published through a
/// watch channel, which by construction notifies only on flips.
pub struct NetworkMonitor {
    config: NetworkConfig,
    connection: Option<Arc<dyn ConnectionInfoSource>>,
    probe: Arc<dyn LatencyProbe>,
    window: Mutex<RttWindow>,
    last_sample: RwLock<Option<NetworkSample>>,
    status_tx: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
    pub fn new(
        config: NetworkConfig,
        connection: Option<Arc<dyn ConnectionInfoSource>>,
        probe: Arc<dyn LatencyProbe>,
    ) -> Self {
        let window = RttWindow::new(config.probe_window);
        let (status_tx, _) = watch::channel(NetworkStatus::Fast);
        let monitor = Self {
            config,
            connection,
            probe,
            window: Mutex::new(window),
            last_sample: RwLock::new(None),
            status_tx,
        };
        monitor.reclassify();
        monitor
    }

    pub fn status(&self) -> NetworkStatus {
        *self.status_tx.borrow()
    }

    pub fn is_slow(&self) -> bool {
        self.status() == NetworkStatus::Slow
    }

    /// Watch status flips. The channel never reports an unchanged value.
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.status_tx.subscribe()
    }

    /// Latest connection-info reading, if a source is installed.
    pub fn sample(&self) -> Option<NetworkSample> {
        self.last_sample.read().clone()
    }

    pub fn save_data(&self) -> bool {
        self.sample().map(|s| s.save_data).unwrap_or(false)
    }

    /// Host entry point for connection-change events from the live API.
    pub fn connection_changed(&self) {
        self.reclassify();
    }

    /// Run one probe round-trip and reclassify. Also the host entry point
    /// for tab-refocus checks.
    pub async fn probe_now(&self) {
        match self.probe.probe().await {
            Ok(rtt) => {
                debug!(rtt_ms = rtt.as_millis() as u64, "latency probe");
                self.window.lock().push(rtt);
                self.reclassify();
            }
            Err(err) => {
                warn!(error = %err, "latency probe failed");
                // A failed probe counts as a bad connection, but the live
                // connection info stays authoritative when present.
                match self.refresh_connection_sample() {
                    Some(sample) => self.publish(sample.classify()),
                    None => self.publish(NetworkStatus::Slow),
                }
            }
        }
    }

    fn refresh_connection_sample(&self) -> Option<NetworkSample> {
        let sample = self.connection.as_ref().and_then(|c| c.sample());
        *self.last_sample.write() = sample.clone();
        sample
    }

    /// Recompute the status from the current signals and publish on flip.
    fn reclassify(&self) {
        let status = match self.refresh_connection_sample() {
            Some(sample) => sample.classify(),
            None => {
                let slow_above = Duration::from_millis(self.config.slow_rtt_ms);
                self.window
                    .lock()
                    .classify(slow_above)
                    .unwrap_or_else(|| self.status())
            }
        };
        self.publish(status);
    }

    fn publish(&self, status: NetworkStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                debug!(?status, "network status changed");
                *current = status;
                true
            }
        });
    }

    /// Spawn the periodic probe loop.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let interval = Duration::from_millis(monitor.config.probe_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.probe_now().await;
            }
        })
    }
}
