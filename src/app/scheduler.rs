//! Predictive preloading: a prioritized queue of warm-up tasks, gated on
//! network quality and bounded by a FIFO cache of completed preloads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::config::{NetworkThreshold, PreloadConfig, PreloadStrategy};
use crate::domain::network::NetworkStatus;
use crate::domain::preload::{
    extract_resource_urls, PreloadCache, PreloadTask, Priority, TaskStatus,
};
use crate::port::fetcher::ResourceFetcher;
use crate::port::telemetry::{TelemetryEvent, TelemetrySink};

use super::analyzer::BehaviorAnalyzer;
use super::monitor::NetworkMonitor;
use super::registry::AppRegistry;

/// Observable scheduler activity, mostly for tests and dashboards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadEvent {
    TaskQueued { app: String, priority: Priority },
    TaskStarted { app: String },
    TaskCompleted { app: String },
    TaskFailed { app: String, reason: String },
    Evicted { app: String },
    Paused,
    Resumed,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone)]
pub struct PreloadStatus {
    pub enabled: bool,
    pub pending: usize,
    pub loading: usize,
    pub cached: Vec<String>,
    pub network: NetworkStatus,
}

pub struct PreloadScheduler {
    config: PreloadConfig,
    registry: Arc<AppRegistry>,
    monitor: Arc<NetworkMonitor>,
    analyzer: Arc<BehaviorAnalyzer>,
    fetcher: Arc<dyn ResourceFetcher>,
    telemetry: Arc<dyn TelemetrySink>,
    queue: Mutex<Vec<PreloadTask>>,
    next_seq: AtomicU64,
    cache: Mutex<PreloadCache>,
    enabled: AtomicBool,
    events_tx: broadcast::Sender<PreloadEvent>,
}

impl PreloadScheduler {
    pub fn new(
        config: PreloadConfig,
        registry: Arc<AppRegistry>,
        monitor: Arc<NetworkMonitor>,
        analyzer: Arc<BehaviorAnalyzer>,
        fetcher: Arc<dyn ResourceFetcher>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let cache = PreloadCache::new(config.cache_size);
        let enabled = config.strategy == PreloadStrategy::Smart;
        let (events_tx, _) = broadcast::channel(64);
        Self {
            config,
            registry,
            monitor,
            analyzer,
            fetcher,
            telemetry,
            queue: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            cache: Mutex::new(cache),
            enabled: AtomicBool::new(enabled),
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreloadEvent> {
        self.events_tx.subscribe()
    }

    /// Request a warm-up of `name`'s assets. Returns `true` when a task was
    /// queued, `false` when the request was skipped (disabled scheduler,
    /// already warm, already queued, unknown app, or a gated network).
    pub fn preload_app(self: &Arc<Self>, name: &str, priority: Priority) -> bool {
        if self.config.strategy == PreloadStrategy::Off || !self.enabled.load(Ordering::SeqCst) {
            return false;
        }
        if self.cache.lock().contains(name) || self.registry.get_instance(name).is_some() {
            return false;
        }
        if self.registry.descriptor(name).is_none() {
            debug!(app = name, "preload requested for unregistered app");
            return false;
        }
        if self.network_gated() {
            debug!(app = name, "preload skipped on slow network");
            return false;
        }
        {
            let mut queue = self.queue.lock();
            if queue.iter().any(|t| t.app_name == name && t.is_active()) {
                return false;
            }
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            queue.push(PreloadTask::new(name, priority, seq));
        }
        self.emit(PreloadEvent::TaskQueued {
            app: name.to_string(),
            priority,
        });
        self.telemetry.track_event(TelemetryEvent::PreloadQueued {
            app: name.to_string(),
            priority,
        });
        self.kick();
        true
    }

    /// Whether current network conditions forbid preloading.
    fn network_gated(&self) -> bool {
        if self.monitor.save_data() {
            return true;
        }
        match self.config.network_threshold {
            NetworkThreshold::Fast => self.monitor.status() == NetworkStatus::Slow,
            NetworkThreshold::Auto => false,
        }
    }

    pub fn pause(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            info!("preloading paused");
            self.emit(PreloadEvent::Paused);
        }
    }

    /// Re-enable admission. A no-op when the configured strategy is off.
    pub fn resume(self: &Arc<Self>) {
        if self.config.strategy == PreloadStrategy::Off {
            return;
        }
        if !self.enabled.swap(true, Ordering::SeqCst) {
            info!("preloading resumed");
            self.emit(PreloadEvent::Resumed);
            self.kick();
        }
    }

    pub fn status(&self) -> PreloadStatus {
        let queue = self.queue.lock();
        PreloadStatus {
            enabled: self.enabled.load(Ordering::SeqCst),
            pending: queue
                .iter()
                .filter(|t| t.status == TaskStatus::Pending)
                .count(),
            loading: queue
                .iter()
                .filter(|t| t.status == TaskStatus::Loading)
                .count(),
            cached: self.cache.lock().names(),
            network: self.monitor.status(),
        }
    }

    pub fn is_preloaded(&self, name: &str) -> bool {
        self.cache.lock().contains(name)
    }

    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Drop a name from the warm cache, typically after its assets went stale.
    pub fn invalidate(&self, name: &str) -> bool {
        self.cache.lock().remove(name)
    }

    fn emit(&self, event: PreloadEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Admission pass: promote pending tasks to loading, best priority first,
    /// enqueue order within a priority, while capacity remains.
    fn kick(self: &Arc<Self>) {
        if !self.enabled.load(Ordering::SeqCst) || self.network_gated() {
            return;
        }
        let admitted: Vec<PreloadTask> = {
            let mut queue = self.queue.lock();
            let loading = queue
                .iter()
                .filter(|t| t.status == TaskStatus::Loading)
                .count();
            let capacity = self.config.max_concurrent.saturating_sub(loading);
            if capacity == 0 {
                return;
            }
            let mut pending: Vec<usize> = queue
                .iter()
                .enumerate()
                .filter(|(_, t)| t.status == TaskStatus::Pending)
                .map(|(i, _)| i)
                .collect();
            pending.sort_by(|&a, &b| {
                queue[b]
                    .priority
                    .cmp(&queue[a].priority)
                    .then(queue[a].seq.cmp(&queue[b].seq))
            });
            pending
                .into_iter()
                .take(capacity)
                .map(|i| {
                    queue[i].status = TaskStatus::Loading;
                    queue[i].started_at = Some(Instant::now());
                    queue[i].clone()
                })
                .collect()
        };
        for task in admitted {
            self.emit(PreloadEvent::TaskStarted {
                app: task.app_name.clone(),
            });
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.execute(task).await;
            });
        }
    }

    /// Fetch the app's entry document and prefetch every asset it references.
    async fn execute(self: &Arc<Self>, task: PreloadTask) {
        let name = task.app_name.clone();
        let result = self.warm(&name).await;
        match result {
            Ok(()) => {
                let evicted = {
                    let mut queue = self.queue.lock();
                    queue.retain(|t| t.app_name != name);
                    self.cache.lock().insert(&name)
                };
                for old in evicted {
                    debug!(app = %old, "evicted from preload cache");
                    self.emit(PreloadEvent::Evicted { app: old });
                }
                let duration_ms = task
                    .started_at
                    .map(|s| s.elapsed().as_millis() as u64)
                    .unwrap_or(0);
                info!(app = %name, duration_ms, "preload completed");
                self.telemetry.track_event(TelemetryEvent::PreloadCompleted {
                    app: name.clone(),
                    duration_ms,
                });
                self.emit(PreloadEvent::TaskCompleted { app: name });
            }
            Err(reason) => {
                warn!(app = %name, %reason, "preload failed");
                // Failed tasks leave the queue so a later request can retry.
                self.queue.lock().retain(|t| t.app_name != name);
                self.telemetry.track_event(TelemetryEvent::PreloadFailed {
                    app: name.clone(),
                    reason: reason.clone(),
                });
                self.emit(PreloadEvent::TaskFailed { app: name, reason });
            }
        }
        self.kick();
    }

    async fn warm(&self, name: &str) -> std::result::Result<(), String> {
        let descriptor = self
            .registry
            .descriptor(name)
            .ok_or_else(|| "app no longer registered".to_string())?;
        let timeout = Duration::from_millis(self.config.resource_timeout_ms);
        let html = tokio::time::timeout(timeout, self.fetcher.fetch_entry(&descriptor.entry))
            .await
            .map_err(|_| format!("entry fetch timed out after {timeout:?}"))?
            .map_err(|err| err.to_string())?;
        let resources = extract_resource_urls(&html, &descriptor.entry);
        debug!(app = name, resources = resources.len(), "prefetching assets");
        let mut set = JoinSet::new();
        for url in resources {
            let fetcher = Arc::clone(&self.fetcher);
            set.spawn(async move {
                let outcome = tokio::time::timeout(timeout, fetcher.prefetch(&url)).await;
                match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(err)) => Some(format!("{url}: {err}")),
                    Err(_) => Some(format!("{url}: timed out")),
                }
            });
        }
        // Asset failures are best-effort losses, not task failures; only a
        // failed entry fetch fails the task.
        let mut failures = Vec::new();
        while let Some(joined) = set.join_next().await {
            if let Ok(Some(failure)) = joined {
                failures.push(failure);
            }
        }
        if !failures.is_empty() {
            warn!(app = name, failed = failures.len(), reasons = %failures.join("; "), "some assets failed to prefetch");
        }
        Ok(())
    }

    /// Spawn the periodic admission tick.
    pub fn spawn_tick(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let interval = Duration::from_millis(scheduler.config.tick_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.kick();
            }
        })
    }

    /// Spawn the predictive loop: after each route change, wait for the dwell
    /// delay and queue the predicted next apps in descending confidence.
    pub fn spawn_route_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut paths = scheduler.analyzer.subscribe_path_changes();
            let delay = Duration::from_millis(scheduler.config.prefetch_delay_ms);
            loop {
                let path = match paths.recv().await {
                    Ok(path) => path,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "route listener lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                tokio::time::sleep(delay).await;
                scheduler.preload_predicted(&path);
            }
        })
    }

    fn preload_predicted(self: &Arc<Self>, path: &str) {
        if !self.config.enable_behavior_prediction {
            return;
        }
        let predictions = self.analyzer.predict_next_paths(path);
        let priorities = [Priority::High, Priority::Medium, Priority::Low];
        for (next, priority) in predictions.iter().zip(priorities) {
            if let Some(descriptor) = self.registry.app_for_path(next) {
                self.preload_app(&descriptor.name, priority);
            }
        }
    }

    /// Spawn the network reaction loop: pause on slow, resume on fast.
    pub fn spawn_network_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        // Subscribe before spawning so a flip between spawn and first poll
        // is still observed.
        let mut status = scheduler.monitor.subscribe();
        tokio::spawn(async move {
            loop {
                if status.changed().await.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                scheduler
                    .telemetry
                    .track_event(TelemetryEvent::NetworkStatusChanged { status: current });
                match current {
                    NetworkStatus::Slow => scheduler.pause(),
                    NetworkStatus::Fast => scheduler.resume(),
                }
            }
        })
    }
}
