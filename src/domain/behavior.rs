//! Navigation behavior records and the derived prediction table.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One observed dwell on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorRecord {
    pub path: String,
    /// When the dwell started.
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    /// Route navigated to next; back-filled when the next record lands.
    #[serde(default)]
    pub next_path: Option<String>,
}

impl BehaviorRecord {
    pub fn new(path: impl Into<String>, timestamp: DateTime<Utc>, duration_ms: u64) -> Self {
        Self {
            path: path.into(),
            timestamp,
            duration_ms,
            next_path: None,
        }
    }

    fn ended_at(&self) -> DateTime<Utc> {
        self.timestamp + Duration::milliseconds(self.duration_ms as i64)
    }
}

/// Append-only log of behavior records, bounded by count and age.
#[derive(Debug, Clone)]
pub struct BehaviorLog {
    records: Vec<BehaviorRecord>,
    max_records: usize,
    retention: Duration,
}

impl BehaviorLog {
    pub fn new(max_records: usize, retention: Duration) -> Self {
        Self {
            records: Vec::new(),
            max_records,
            retention,
        }
    }

    /// Rebuild a log from persisted records, pruning anything outside the
    /// retention window.
    pub fn from_records(
        records: Vec<BehaviorRecord>,
        max_records: usize,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let mut log = Self {
            records,
            max_records,
            retention,
        };
        log.prune(now);
        log
    }

    /// Append a record, back-filling the previous record's `next_path` when
    /// the gap between the two dwells stays within `session_timeout`.
    pub fn append(&mut self, record: BehaviorRecord, session_timeout: Duration) {
        if let Some(last) = self.records.last_mut() {
            let gap = record.timestamp - last.ended_at();
            if last.next_path.is_none() && gap <= session_timeout {
                last.next_path = Some(record.path.clone());
            }
        }
        self.records.push(record);
        self.prune(self.records.last().map(|r| r.timestamp).unwrap_or_else(Utc::now));
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.retention;
        self.records.retain(|r| r.timestamp > cutoff);
        if self.records.len() > self.max_records {
            let excess = self.records.len() - self.max_records;
            self.records.drain(..excess);
        }
    }

    pub fn records(&self) -> &[BehaviorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Ranked next-route predictions, derived purely from a record log.
#[derive(Debug, Clone, Default)]
pub struct PredictionTable {
    table: HashMap<String, Vec<String>>,
}

impl PredictionTable {
    /// Number of ranked candidates kept per source path.
    pub const FANOUT: usize = 3;

    /// Derive the table from the log: per source path, the up-to-three next
    /// paths by descending transition frequency. Ties break lexicographically
    /// so the derivation is a pure function of the records.
    pub fn build(records: &[BehaviorRecord]) -> Self {
        let mut transitions: HashMap<&str, HashMap<&str, usize>> = HashMap::new();
        for record in records {
            if let Some(next) = &record.next_path {
                *transitions
                    .entry(&record.path)
                    .or_default()
                    .entry(next)
                    .or_insert(0) += 1;
            }
        }

        let mut table = HashMap::new();
        for (from, counts) in transitions {
            let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            table.insert(
                from.to_string(),
                ranked
                    .into_iter()
                    .take(Self::FANOUT)
                    .map(|(path, _)| path.to_string())
                    .collect(),
            );
        }
        Self { table }
    }

    /// Ranked next paths for `path`; empty for paths never seen.
    pub fn predict(&self, path: &str) -> Vec<String> {
        self.table.get(path).cloned().unwrap_or_default()
    }
}

/// `count(from -> to) / count(from -> *)`; zero when `from` was never seen.
pub fn transition_confidence(records: &[BehaviorRecord], from: &str, to: &str) -> f64 {
    let total = records.iter().filter(|r| r.path == from).count();
    if total == 0 {
        return 0.0;
    }
    let hits = records
        .iter()
        .filter(|r| r.path == from && r.next_path.as_deref() == Some(to))
        .count();
    hits as f64 / total as f64
}
