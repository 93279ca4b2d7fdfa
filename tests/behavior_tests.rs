//! Integration tests for behavior persistence: round trips through the
//! key-value store and graceful degradation on corrupt data.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use microweave::adapter::store::MemoryStore;
use microweave::app::analyzer::BehaviorAnalyzer;
use microweave::config::BehaviorConfig;
use microweave::port::storage::KeyValueStore;

fn seed(analyzer: &BehaviorAnalyzer) -> chrono::DateTime<Utc> {
    let t0 = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).unwrap();
    let mut at = t0;
    for path in ["/home", "/orders", "/home", "/orders", "/home", "/billing"] {
        analyzer.route_changed_at(path, at);
        at += chrono::Duration::seconds(30);
    }
    at
}

#[tokio::test]
async fn history_round_trips_through_the_store() {
    let store = Arc::new(MemoryStore::default());
    let analyzer = BehaviorAnalyzer::new(BehaviorConfig::default(), store.clone());
    seed(&analyzer);
    let before = analyzer.recent_records(10);
    assert_eq!(before.len(), 5);
    analyzer.persist().await;

    let restored = BehaviorAnalyzer::new(BehaviorConfig::default(), store);
    restored.load_history().await;

    assert_eq!(restored.recent_records(10), before);
    assert_eq!(
        restored.predict_next_paths("/home"),
        analyzer.predict_next_paths("/home")
    );
}

#[tokio::test]
async fn predictions_survive_a_restart() {
    let store = Arc::new(MemoryStore::default());
    let analyzer = BehaviorAnalyzer::new(BehaviorConfig::default(), store.clone());
    let at = seed(&analyzer);
    // Navigate away from /billing so its dwell closes and the
    // /home -> /billing transition enters the table.
    analyzer.route_changed_at("/home", at);
    // /home -> /orders twice, /home -> /billing once.
    assert_eq!(
        analyzer.predict_next_paths("/home"),
        vec!["/orders", "/billing"]
    );
    analyzer.persist().await;

    let restored = BehaviorAnalyzer::new(BehaviorConfig::default(), store);
    restored.load_history().await;
    assert_eq!(
        restored.predict_next_paths("/home"),
        vec!["/orders", "/billing"]
    );
    assert!((restored.prediction_confidence("/home", "/orders") - 2.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn corrupt_history_degrades_to_an_empty_log() {
    let store = Arc::new(MemoryStore::default());
    let key = BehaviorConfig::default().storage_key;
    store.set(&key, "{ not json").await.unwrap();

    let analyzer = BehaviorAnalyzer::new(BehaviorConfig::default(), store);
    analyzer.load_history().await;

    let stats = analyzer.statistics();
    assert_eq!(stats.total_records, 0);
    assert!(analyzer.predict_next_paths("/home").is_empty());
}

#[tokio::test]
async fn missing_history_starts_empty() {
    let analyzer = BehaviorAnalyzer::new(
        BehaviorConfig::default(),
        Arc::new(MemoryStore::default()),
    );
    analyzer.load_history().await;
    assert_eq!(analyzer.statistics().total_records, 0);
}

#[tokio::test]
async fn statistics_summarize_the_log() {
    let analyzer = BehaviorAnalyzer::new(
        BehaviorConfig::default(),
        Arc::new(MemoryStore::default()),
    );
    seed(&analyzer);

    let stats = analyzer.statistics();
    assert_eq!(stats.total_records, 5);
    assert_eq!(stats.unique_paths, 2);
    assert_eq!(stats.average_duration_ms, 30_000);
    assert_eq!(stats.most_visited, Some(("/home".to_string(), 3)));
}
