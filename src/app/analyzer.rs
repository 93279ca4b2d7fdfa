//! Navigation behavior analysis: dwell recording and next-route prediction.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::BehaviorConfig;
use crate::domain::behavior::{
    transition_confidence, BehaviorLog, BehaviorRecord, PredictionTable,
};
use crate::port::storage::KeyValueStore;

/// Wire format for persisted history.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedHistory {
    records: Vec<BehaviorRecord>,
    last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Visit {
    path: String,
    started: DateTime<Utc>,
}

/// Aggregate view over the whole behavior log.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorStatistics {
    pub total_records: usize,
    pub unique_paths: usize,
    pub average_duration_ms: u64,
    pub most_visited: Option<(String, usize)>,
}

/// Records per-route dwell and derives ranked next-route predictions.
///
/// The prediction table is rebuilt on every append and is always derivable
/// purely from the record log; queries never mutate anything.
pub struct BehaviorAnalyzer {
    config: BehaviorConfig,
    log: Mutex<BehaviorLog>,
    table: RwLock<PredictionTable>,
    current: Mutex<Option<Visit>>,
    store: Arc<dyn KeyValueStore>,
    path_tx: broadcast::Sender<String>,
}

impl BehaviorAnalyzer {
    pub fn new(config: BehaviorConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let (path_tx, _) = broadcast::channel(32);
        let log = BehaviorLog::new(config.max_records, Duration::days(config.retention_days));
        Self {
            config,
            log: Mutex::new(log),
            table: RwLock::new(PredictionTable::default()),
            current: Mutex::new(None),
            store,
            path_tx,
        }
    }

    /// Route-change notifications, consumed by the preload scheduler.
    pub fn subscribe_path_changes(&self) -> broadcast::Receiver<String> {
        self.path_tx.subscribe()
    }

    /// Record a navigation to `path` now.
    pub fn route_changed(&self, path: &str) {
        self.route_changed_at(path, Utc::now());
    }

    /// Record a navigation at an explicit instant (history replay, tests).
    pub fn route_changed_at(&self, path: &str, now: DateTime<Utc>) {
        self.close_current_visit(now);
        *self.current.lock() = Some(Visit {
            path: path.to_string(),
            started: now,
        });
        let _ = self.path_tx.send(path.to_string());
    }

    /// Close the in-progress visit without starting a new one (page hide).
    pub fn flush_current(&self) {
        self.close_current_visit(Utc::now());
    }

    fn close_current_visit(&self, now: DateTime<Utc>) {
        let Some(visit) = self.current.lock().take() else {
            return;
        };
        let duration = now - visit.started;
        let duration_ms = duration.num_milliseconds().max(0) as u64;
        // Sub-second dwell is an accidental navigation, not behavior.
        if duration_ms <= self.config.min_dwell_ms {
            debug!(path = %visit.path, duration_ms, "dwell below threshold, dropped");
            return;
        }

        let record = BehaviorRecord::new(visit.path, visit.started, duration_ms);
        let mut log = self.log.lock();
        log.append(
            record,
            Duration::milliseconds(self.config.session_timeout_ms as i64),
        );
        *self.table.write() = PredictionTable::build(log.records());
    }

    /// Up to three predicted next routes for `path`, most likely first.
    pub fn predict_next_paths(&self, path: &str) -> Vec<String> {
        self.table.read().predict(path)
    }

    /// Share of transitions out of `from` that went to `to`.
    pub fn prediction_confidence(&self, from: &str, to: &str) -> f64 {
        transition_confidence(self.log.lock().records(), from, to)
    }

    pub fn path_frequency(&self, path: &str) -> usize {
        self.log
            .lock()
            .records()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn average_dwell_ms(&self, path: &str) -> u64 {
        let log = self.log.lock();
        let dwells: Vec<u64> = log
            .records()
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.duration_ms)
            .collect();
        if dwells.is_empty() {
            return 0;
        }
        dwells.iter().sum::<u64>() / dwells.len() as u64
    }

    pub fn recent_records(&self, limit: usize) -> Vec<BehaviorRecord> {
        let log = self.log.lock();
        let records = log.records();
        let skip = records.len().saturating_sub(limit);
        records[skip..].to_vec()
    }

    pub fn statistics(&self) -> BehaviorStatistics {
        let log = self.log.lock();
        let records = log.records();
        let total_records = records.len();
        let unique_paths = records
            .iter()
            .map(|r| r.path.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len();
        let average_duration_ms = if total_records == 0 {
            0
        } else {
            records.iter().map(|r| r.duration_ms).sum::<u64>() / total_records as u64
        };
        let most_visited = records
            .iter()
            .map(|r| r.path.as_str())
            .fold(std::collections::HashMap::<&str, usize>::new(), |mut acc, p| {
                *acc.entry(p).or_insert(0) += 1;
                acc
            })
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(path, count)| (path.to_string(), count));
        BehaviorStatistics {
            total_records,
            unique_paths,
            average_duration_ms,
            most_visited,
        }
    }

    pub fn clear(&self) {
        self.log.lock().clear();
        *self.table.write() = PredictionTable::default();
        *self.current.lock() = None;
    }

    /// Load persisted history. Corrupt or missing storage degrades to an
    /// empty log, never an error.
    pub async fn load_history(&self) {
        let raw = match self.store.get(&self.config.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "failed to read behavior history, starting empty");
                return;
            }
        };
        let history: PersistedHistory = match serde_json::from_str(&raw) {
            Ok(history) => history,
            Err(err) => {
                warn!(error = %err, "corrupt behavior history, starting empty");
                return;
            }
        };

        let mut log = self.log.lock();
        *log = BehaviorLog::from_records(
            history.records,
            self.config.max_records,
            Duration::days(self.config.retention_days),
            Utc::now(),
        );
        *self.table.write() = PredictionTable::build(log.records());
        debug!(records = log.len(), "behavior history loaded");
    }

    /// Persist the log. Storage failures are dropped with a warning.
    pub async fn persist(&self) {
        let history = PersistedHistory {
            records: self.log.lock().records().to_vec(),
            last_updated: Utc::now(),
        };
        let raw = match serde_json::to_string(&history) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "failed to serialize behavior history");
                return;
            }
        };
        if let Err(err) = self.store.set(&self.config.storage_key, &raw).await {
            warn!(error = %err, "failed to persist behavior history");
        }
    }
}
