//! Application services: the orchestrator facade and the components it wires
//! together (registry, state bus, behavior analyzer, network monitor, and
//! preload scheduler).

pub mod analyzer;
pub mod monitor;
pub mod registry;
pub mod scheduler;
pub mod state_bus;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapter::http::{HttpLatencyProbe, HttpResourceFetcher};
use crate::adapter::store::MemoryStore;
use crate::adapter::telemetry::{NoopContainerHost, NoopTelemetry};
use crate::config::Config;
use crate::domain::app::{AppDescriptor, Props};
use crate::domain::network::NetworkStatus;
use crate::domain::preload::Priority;
use crate::domain::state::StateSnapshot;
use crate::error::{ConfigError, Result};
use crate::port::fetcher::ResourceFetcher;
use crate::port::loader::{ContainerHost, ModuleLoader};
use crate::port::probe::{ConnectionInfoSource, LatencyProbe};
use crate::port::storage::KeyValueStore;
use crate::port::telemetry::TelemetrySink;

use analyzer::BehaviorAnalyzer;
use monitor::NetworkMonitor;
use registry::{AppInstance, AppRegistry, LifecycleHooks};
use scheduler::{PreloadEvent, PreloadScheduler, PreloadStatus};
use state_bus::{GlobalStateBus, StateSubscription};

/// Builds an [`Orchestrator`]. A module loader is required; every other
/// collaborator has a working default.
pub struct OrchestratorBuilder {
    config: Config,
    loader: Option<Arc<dyn ModuleLoader>>,
    containers: Option<Arc<dyn ContainerHost>>,
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    probe: Option<Arc<dyn LatencyProbe>>,
    connection: Option<Arc<dyn ConnectionInfoSource>>,
    store: Option<Arc<dyn KeyValueStore>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl OrchestratorBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            loader: None,
            containers: None,
            fetcher: None,
            probe: None,
            connection: None,
            store: None,
            telemetry: None,
        }
    }

    pub fn loader(mut self, loader: Arc<dyn ModuleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn containers(mut self, containers: Arc<dyn ContainerHost>) -> Self {
        self.containers = Some(containers);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn LatencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn connection(mut self, connection: Arc<dyn ConnectionInfoSource>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;
        let loader = self
            .loader
            .ok_or(ConfigError::MissingField { field: "loader" })?;
        let telemetry = self
            .telemetry
            .unwrap_or_else(|| Arc::new(NoopTelemetry));
        let containers = self
            .containers
            .unwrap_or_else(|| Arc::new(NoopContainerHost));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::default()));
        let fetcher: Arc<dyn ResourceFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpResourceFetcher::new(
                self.config.preload.resource_timeout_ms,
            )?),
        };
        let probe: Arc<dyn LatencyProbe> = match self.probe {
            Some(probe) => probe,
            None if !self.config.network.probe_url.is_empty() => Arc::new(HttpLatencyProbe::new(
                &self.config.network.probe_url,
                self.config.network.slow_rtt_ms * 2,
            )?),
            None => {
                return Err(ConfigError::MissingField {
                    field: "probe_url",
                }
                .into())
            }
        };

        let state = Arc::new(GlobalStateBus::new(Props::new()));
        let registry = Arc::new(AppRegistry::new(
            loader,
            containers,
            state,
            telemetry.clone(),
        ));
        let analyzer = Arc::new(BehaviorAnalyzer::new(self.config.behavior.clone(), store));
        let monitor = Arc::new(NetworkMonitor::new(
            self.config.network.clone(),
            self.connection,
            probe,
        ));
        let scheduler = Arc::new(PreloadScheduler::new(
            self.config.preload.clone(),
            registry.clone(),
            monitor.clone(),
            analyzer.clone(),
            fetcher,
            telemetry.clone(),
        ));
        Ok(Orchestrator {
            registry,
            analyzer,
            monitor,
            scheduler,
            telemetry,
            tasks: Mutex::new(Vec::new()),
        })
    }
}

/// The orchestration core: one facade over app lifecycle, shared state,
/// behavior tracking, network awareness, and predictive preloading.
pub struct Orchestrator {
    registry: Arc<AppRegistry>,
    analyzer: Arc<BehaviorAnalyzer>,
    monitor: Arc<NetworkMonitor>,
    scheduler: Arc<PreloadScheduler>,
    telemetry: Arc<dyn TelemetrySink>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn builder(config: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Restore persisted history and start the background loops. Idempotent
    /// startup is not supported; call once.
    pub async fn start(&self) {
        self.analyzer.load_history().await;
        let mut tasks = self.tasks.lock();
        tasks.push(self.monitor.spawn());
        tasks.push(self.scheduler.spawn_tick());
        tasks.push(self.scheduler.spawn_route_listener());
        tasks.push(self.scheduler.spawn_network_listener());
        info!("orchestrator started");
    }

    /// Flush the open visit, persist history, and stop the background loops.
    pub async fn shutdown(&self) {
        self.analyzer.flush_current();
        self.analyzer.persist().await;
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("orchestrator stopped");
    }

    // --- lifecycle ---

    pub fn register_apps(&self, descriptors: Vec<AppDescriptor>, hooks: LifecycleHooks) {
        self.registry.register_apps(descriptors, hooks);
    }

    pub async fn load_app(
        &self,
        name: &str,
        container: Option<&str>,
        props: Option<Props>,
    ) -> Result<Arc<AppInstance>> {
        self.registry.load_app(name, container, props).await
    }

    pub async fn unload_app(&self, name: &str) -> Result<()> {
        self.registry.unload_app(name).await
    }

    pub async fn update_app(&self, name: &str, props: Props) -> Result<()> {
        self.registry.update_app(name, props).await
    }

    pub fn get_instance(&self, name: &str) -> Option<Arc<AppInstance>> {
        self.registry.get_instance(name)
    }

    pub fn app_for_path(&self, path: &str) -> Option<AppDescriptor> {
        self.registry.app_for_path(path)
    }

    pub fn registry(&self) -> Arc<AppRegistry> {
        self.registry.clone()
    }

    // --- shared state ---

    pub fn set_global_state(&self, partial: Props) -> StateSnapshot {
        self.registry.set_global_state(partial)
    }

    pub fn global_state(&self) -> StateSnapshot {
        self.registry.global_state()
    }

    pub fn on_global_state_change<F>(&self, callback: F) -> StateSubscription
    where
        F: Fn(&StateSnapshot, &StateSnapshot) + Send + Sync + 'static,
    {
        self.registry.on_global_state_change(callback)
    }

    // --- navigation signals from the host ---

    /// Record a route change; feeds the analyzer and, after the configured
    /// dwell delay, the predictive preloader.
    pub fn route_changed(&self, path: &str) {
        self.analyzer.route_changed(path);
        self.telemetry.track_page_view(path);
    }

    /// The host lost visibility; close out the open visit and persist.
    pub async fn page_hidden(&self) {
        self.analyzer.flush_current();
        self.analyzer.persist().await;
    }

    /// The host regained visibility; re-check network conditions.
    pub async fn page_visible(&self) {
        self.monitor.probe_now().await;
    }

    // --- behavior ---

    pub fn predict_next_paths(&self, path: &str) -> Vec<String> {
        self.analyzer.predict_next_paths(path)
    }

    pub fn analyzer(&self) -> Arc<BehaviorAnalyzer> {
        self.analyzer.clone()
    }

    // --- network ---

    pub fn network_status(&self) -> NetworkStatus {
        self.monitor.status()
    }

    pub fn monitor(&self) -> Arc<NetworkMonitor> {
        self.monitor.clone()
    }

    // --- preloading ---

    pub fn preload_app(&self, name: &str, priority: Priority) -> bool {
        self.scheduler.preload_app(name, priority)
    }

    pub fn preload_status(&self) -> PreloadStatus {
        self.scheduler.status()
    }

    pub fn subscribe_preload_events(&self) -> tokio::sync::broadcast::Receiver<PreloadEvent> {
        self.scheduler.subscribe()
    }

    pub fn pause_preloading(&self) {
        self.scheduler.pause();
    }

    pub fn resume_preloading(&self) {
        self.scheduler.resume();
    }

    pub fn clear_preload_cache(&self) {
        self.scheduler.clear_cache();
    }

    pub fn scheduler(&self) -> Arc<PreloadScheduler> {
        self.scheduler.clone()
    }
}
