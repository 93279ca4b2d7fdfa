//! Integration tests for the network monitor: classification sources,
//! probe fallback, and flip-only notifications.

use std::sync::Arc;
use std::time::Duration;

use microweave::app::monitor::NetworkMonitor;
use microweave::config::NetworkConfig;
use microweave::domain::network::NetworkStatus;
use microweave::port::probe::ConnectionInfoSource;
use microweave::testkit::domain::{fast_sample, slow_sample};
use microweave::testkit::net::{ManualConnection, ScriptedProbe};

fn monitor(
    connection: Option<Arc<ManualConnection>>,
    probe: Arc<ScriptedProbe>,
) -> NetworkMonitor {
    NetworkMonitor::new(
        NetworkConfig::default(),
        connection.map(|c| c as Arc<dyn ConnectionInfoSource>),
        probe,
    )
}

#[tokio::test]
async fn connection_info_is_the_authoritative_signal() {
    let connection = Arc::new(ManualConnection::new(fast_sample()));
    let monitor = monitor(
        Some(connection.clone()),
        Arc::new(ScriptedProbe::new(Duration::from_millis(50))),
    );
    assert_eq!(monitor.status(), NetworkStatus::Fast);

    connection.set(slow_sample());
    monitor.connection_changed();
    assert_eq!(monitor.status(), NetworkStatus::Slow);

    connection.set(fast_sample());
    monitor.connection_changed();
    assert_eq!(monitor.status(), NetworkStatus::Fast);
}

#[tokio::test]
async fn a_degraded_reading_classifies_slow() {
    // 3g, 1.0 Mbps downlink, 350 ms round trip.
    let connection = Arc::new(ManualConnection::new(slow_sample()));
    let monitor = monitor(
        Some(connection),
        Arc::new(ScriptedProbe::new(Duration::from_millis(50))),
    );
    assert_eq!(monitor.status(), NetworkStatus::Slow);
}

#[tokio::test]
async fn probe_average_is_the_fallback_classifier() {
    let probe = Arc::new(ScriptedProbe::new(Duration::from_millis(40)));
    probe.push_rtt(Duration::from_millis(700));
    probe.push_rtt(Duration::from_millis(700));
    let monitor = monitor(None, probe.clone());

    monitor.probe_now().await;
    monitor.probe_now().await;
    assert_eq!(monitor.status(), NetworkStatus::Slow);

    // Ten healthy samples push the slow readings out of the window.
    for _ in 0..10 {
        monitor.probe_now().await;
    }
    assert_eq!(monitor.status(), NetworkStatus::Fast);
}

#[tokio::test]
async fn a_failed_probe_without_connection_info_reports_slow() {
    let probe = Arc::new(ScriptedProbe::new(Duration::from_millis(40)));
    probe.push_failure("probe endpoint unreachable");
    let monitor = monitor(None, probe);

    monitor.probe_now().await;
    assert_eq!(monitor.status(), NetworkStatus::Slow);
}

#[tokio::test]
async fn a_failed_probe_defers_to_connection_info_when_present() {
    let probe = Arc::new(ScriptedProbe::new(Duration::from_millis(40)));
    probe.push_failure("probe endpoint unreachable");
    let connection = Arc::new(ManualConnection::new(fast_sample()));
    let monitor = monitor(Some(connection), probe);

    monitor.probe_now().await;
    assert_eq!(monitor.status(), NetworkStatus::Fast);
}

#[tokio::test]
async fn subscribers_are_notified_only_on_flips() {
    let connection = Arc::new(ManualConnection::new(fast_sample()));
    let monitor = monitor(
        Some(connection.clone()),
        Arc::new(ScriptedProbe::new(Duration::from_millis(50))),
    );
    let mut rx = monitor.subscribe();
    assert!(!rx.has_changed().unwrap());

    // Same classification again: no notification.
    connection.set(fast_sample());
    monitor.connection_changed();
    assert!(!rx.has_changed().unwrap());

    connection.set(slow_sample());
    monitor.connection_changed();
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), NetworkStatus::Slow);
}

#[tokio::test(start_paused = true)]
async fn the_probe_loop_samples_on_the_configured_interval() {
    let probe = Arc::new(ScriptedProbe::new(Duration::from_millis(40)));
    let monitor = Arc::new(NetworkMonitor::new(
        NetworkConfig::default(),
        None,
        probe.clone(),
    ));
    let task = monitor.spawn();

    // First tick fires immediately, then every 30 s.
    tokio::time::sleep(Duration::from_millis(61_000)).await;
    assert_eq!(probe.calls(), 3);
    assert_eq!(monitor.status(), NetworkStatus::Fast);

    task.abort();
}
