//! Application registry and lifecycle engine.
//!
//! Owns every [`AppInstance`] and drives each through the lifecycle graph in
//! `domain::app`. One driver task per instance keeps phases strictly
//! sequential; instances for different applications interleave freely.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::app::{AppDescriptor, AppStatus, Props};
use crate::domain::state::StateSnapshot;
use crate::error::{Error, LifecycleError, Result};
use crate::port::loader::{AppModule, ContainerHost, ModuleLoader, MountProps};
use crate::port::telemetry::{ErrorReport, TelemetryEvent, TelemetrySink};

use super::state_bus::{GlobalStateBus, StateSubscription};

type HookError = Box<dyn std::error::Error + Send + Sync>;
type HookFuture = Pin<Box<dyn Future<Output = std::result::Result<(), HookError>> + Send>>;

/// A host-registered lifecycle callback.
pub type HookFn = Arc<dyn Fn(AppDescriptor) -> HookFuture + Send + Sync>;

/// Box an async closure into a [`HookFn`].
pub fn hook<F, Fut, E>(callback: F) -> HookFn
where
    F: Fn(AppDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
    E: Into<HookError>,
{
    Arc::new(move |descriptor| {
        let fut = callback(descriptor);
        Box::pin(async move { fut.await.map_err(Into::into) })
    })
}

/// Host lifecycle hooks, each independently optional.
///
/// All dispatch goes through [`LifecycleHooks::dispatch`], which awaits the
/// hook before the engine proceeds to the next transition; a rejecting hook
/// aborts the lifecycle.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub before_load: Option<HookFn>,
    pub before_mount: Option<HookFn>,
    pub after_mount: Option<HookFn>,
    pub before_unmount: Option<HookFn>,
    pub after_unmount: Option<HookFn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    BeforeLoad,
    BeforeMount,
    AfterMount,
    BeforeUnmount,
    AfterUnmount,
}

impl Hook {
    fn name(self) -> &'static str {
        match self {
            Hook::BeforeLoad => "before_load",
            Hook::BeforeMount => "before_mount",
            Hook::AfterMount => "after_mount",
            Hook::BeforeUnmount => "before_unmount",
            Hook::AfterUnmount => "after_unmount",
        }
    }
}

impl LifecycleHooks {
    async fn dispatch(&self, hook: Hook, descriptor: &AppDescriptor) -> Result<()> {
        let callback = match hook {
            Hook::BeforeLoad => self.before_load.as_ref(),
            Hook::BeforeMount => self.before_mount.as_ref(),
            Hook::AfterMount => self.after_mount.as_ref(),
            Hook::BeforeUnmount => self.before_unmount.as_ref(),
            Hook::AfterUnmount => self.after_unmount.as_ref(),
        };
        if let Some(callback) = callback {
            debug!(app = %descriptor.name, hook = hook.name(), "dispatching lifecycle hook");
            callback(descriptor.clone()).await.map_err(|err| {
                Error::from(LifecycleError::HookFailed {
                    hook: hook.name(),
                    app: descriptor.name.clone(),
                    reason: err.to_string(),
                })
            })?;
        }
        Ok(())
    }
}

/// One live (or parked) application instance.
///
/// Exposes the per-phase waiters callers use for fine-grained sequencing:
/// [`wait_loaded`](Self::wait_loaded), [`wait_bootstrapped`](Self::wait_bootstrapped),
/// [`wait_mounted`](Self::wait_mounted), [`wait_unmounted`](Self::wait_unmounted).
pub struct AppInstance {
    descriptor: AppDescriptor,
    container: String,
    props: Props,
    status_tx: watch::Sender<AppStatus>,
    /// Set on the first transition into `Mounted`; disambiguates the
    /// pre-mount and post-unmount `NotMounted` states for waiters.
    has_mounted: AtomicBool,
    has_unmounted: AtomicBool,
    module: tokio::sync::Mutex<Option<Box<dyn AppModule>>>,
    /// Serializes lifecycle phases for this instance.
    phase: tokio::sync::Mutex<()>,
    error: RwLock<Option<String>>,
}

impl std::fmt::Debug for AppInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppInstance")
            .field("name", &self.descriptor.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl AppInstance {
    fn new(descriptor: AppDescriptor, container: String, props: Props) -> Self {
        let (status_tx, _) = watch::channel(AppStatus::NotLoaded);
        Self {
            descriptor,
            container,
            props,
            status_tx,
            has_mounted: AtomicBool::new(false),
            has_unmounted: AtomicBool::new(false),
            module: tokio::sync::Mutex::new(None),
            phase: tokio::sync::Mutex::new(()),
            error: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &AppDescriptor {
        &self.descriptor
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn status(&self) -> AppStatus {
        *self.status_tx.borrow()
    }

    /// Watch every status transition of this instance.
    pub fn status_stream(&self) -> watch::Receiver<AppStatus> {
        self.status_tx.subscribe()
    }

    /// Message of the failure that parked this instance, if any.
    pub fn last_error(&self) -> Option<String> {
        self.error.read().clone()
    }

    fn set_error(&self, message: String) {
        *self.error.write() = Some(message);
    }

    fn transition(&self, to: AppStatus) -> Result<()> {
        let from = self.status();
        if !from.can_transition_to(to) {
            return Err(LifecycleError::InvalidTransition {
                app: self.descriptor.name.clone(),
                from,
                to,
            }
            .into());
        }
        if to == AppStatus::Mounted {
            self.has_mounted.store(true, Ordering::SeqCst);
        }
        if from == AppStatus::Unmounting && to == AppStatus::NotMounted {
            self.has_unmounted.store(true, Ordering::SeqCst);
        }
        debug!(app = %self.descriptor.name, ?from, ?to, "lifecycle transition");
        self.status_tx.send_replace(to);
        Ok(())
    }

    fn mount_props(&self, global_state: StateSnapshot) -> MountProps {
        MountProps {
            container: self.container.clone(),
            props: self.props.clone(),
            global_state,
        }
    }

    async fn wait(&self, reached: impl Fn(&AppInstance, AppStatus) -> bool) -> Result<()> {
        let mut rx = self.status_tx.subscribe();
        let status = *rx
            .wait_for(|status| reached(self, *status) || status.is_terminal())
            .await
            .map_err(|_| {
                Error::from(LifecycleError::LoadFailed {
                    app: self.descriptor.name.clone(),
                    reason: "instance dropped".into(),
                })
            })?;
        if status.is_terminal() {
            return Err(LifecycleError::LoadFailed {
                app: self.descriptor.name.clone(),
                reason: self
                    .last_error()
                    .unwrap_or_else(|| format!("parked in {status:?}")),
            }
            .into());
        }
        Ok(())
    }

    /// Resolves once the source has been fetched and executed.
    pub async fn wait_loaded(&self) -> Result<()> {
        self.wait(|_, status| status.is_loaded()).await
    }

    /// Resolves once bootstrap has completed.
    pub async fn wait_bootstrapped(&self) -> Result<()> {
        self.wait(|_, status| status.is_bootstrapped()).await
    }

    /// Resolves once the instance has mounted.
    pub async fn wait_mounted(&self) -> Result<()> {
        self.wait(|inst, _| inst.has_mounted.load(Ordering::SeqCst))
            .await
    }

    /// Resolves once the instance has unmounted after a successful mount.
    pub async fn wait_unmounted(&self) -> Result<()> {
        self.wait(|inst, _| inst.has_unmounted.load(Ordering::SeqCst))
            .await
    }

    /// Wait for an in-flight load to settle, successfully or not.
    async fn settle(&self) {
        let _ = self.wait_mounted().await;
    }
}

/// The registry: descriptors, instances, and the operations that move
/// instances through the lifecycle.
pub struct AppRegistry {
    descriptors: RwLock<HashMap<String, AppDescriptor>>,
    instances: Mutex<HashMap<String, Arc<AppInstance>>>,
    hooks: RwLock<LifecycleHooks>,
    loader: Arc<dyn ModuleLoader>,
    containers: Arc<dyn ContainerHost>,
    state: Arc<GlobalStateBus>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl AppRegistry {
    pub fn new(
        loader: Arc<dyn ModuleLoader>,
        containers: Arc<dyn ContainerHost>,
        state: Arc<GlobalStateBus>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            hooks: RwLock::new(LifecycleHooks::default()),
            loader,
            containers,
            state,
            telemetry,
        }
    }

    /// Store descriptors and replace the hook set. Re-registering a name
    /// replaces its descriptor without touching a running instance.
    pub fn register_apps(&self, descriptors: Vec<AppDescriptor>, hooks: LifecycleHooks) {
        let mut map = self.descriptors.write();
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            if map.insert(name.clone(), descriptor).is_some() {
                info!(app = %name, "descriptor replaced");
            } else {
                debug!(app = %name, "application registered");
            }
        }
        *self.hooks.write() = hooks;
    }

    pub fn descriptor(&self, name: &str) -> Option<AppDescriptor> {
        self.descriptors.read().get(name).cloned()
    }

    /// The registered application owning `path`, longest active rule first.
    pub fn app_for_path(&self, path: &str) -> Option<AppDescriptor> {
        self.descriptors
            .read()
            .values()
            .filter(|d| d.matches_path(path))
            .max_by_key(|d| d.active_rule.len())
            .cloned()
    }

    pub fn get_instance(&self, name: &str) -> Option<Arc<AppInstance>> {
        self.instances.lock().get(name).cloned()
    }

    /// Load an application and resolve once it is mounted.
    ///
    /// Concurrent calls for the same name join the in-flight instance, so at
    /// most one non-terminal instance exists per name and exactly one
    /// `LoadingSource` transition occurs per load.
    pub async fn load_app(
        &self,
        name: &str,
        container: Option<&str>,
        props: Option<Props>,
    ) -> Result<Arc<AppInstance>> {
        let descriptor = self.descriptor(name).ok_or_else(|| {
            Error::from(LifecycleError::AppNotFound {
                name: name.to_string(),
            })
        })?;

        let (instance, fresh) = {
            let mut instances = self.instances.lock();
            match instances.get(name) {
                Some(existing) if !existing.status().is_terminal() => (existing.clone(), false),
                _ => {
                    let mut merged = descriptor.props.clone();
                    if let Some(overrides) = props {
                        merged.extend(overrides);
                    }
                    let container = container
                        .map(str::to_string)
                        .unwrap_or_else(|| descriptor.container.clone());
                    let instance =
                        Arc::new(AppInstance::new(descriptor.clone(), container, merged));
                    instances.insert(name.to_string(), instance.clone());
                    (instance, true)
                }
            }
        };

        if fresh {
            let driver = Driver {
                instance: instance.clone(),
                hooks: self.hooks.read().clone(),
                loader: self.loader.clone(),
                containers: self.containers.clone(),
                state: self.state.clone(),
                telemetry: self.telemetry.clone(),
            };
            tokio::spawn(driver.run());
        } else {
            debug!(app = %name, "joining in-flight instance");
        }

        instance.wait_mounted().await?;
        Ok(instance)
    }

    /// Unload an application: no-op when no instance exists. Waits for an
    /// in-flight load to settle before tearing anything down.
    pub async fn unload_app(&self, name: &str) -> Result<()> {
        let Some(instance) = self.get_instance(name) else {
            debug!(app = %name, "unload requested for absent instance");
            return Ok(());
        };

        instance.settle().await;
        let _phase = instance.phase.lock().await;

        if instance.status() != AppStatus::Mounted {
            // Parked or never mounted: just evict.
            self.containers.hide(instance.container());
            self.instances.lock().remove(name);
            debug!(app = %name, status = ?instance.status(), "evicted without unmount");
            return Ok(());
        }

        let hooks = self.hooks.read().clone();
        let descriptor = instance.descriptor().clone();

        if let Err(err) = hooks.dispatch(Hook::BeforeUnmount, &descriptor).await {
            self.telemetry
                .report_error(ErrorReport::for_app(name, err.to_string()));
            return Err(err);
        }

        let mut failure: Option<Error> = None;
        instance.transition(AppStatus::Unmounting)?;

        let props = instance.mount_props(self.state.snapshot());
        let module = instance.module.lock().await.take();
        if let Some(module) = module {
            if let Err(err) = module.unmount(&props).await {
                warn!(app = %name, error = %err, "unmount hook rejected");
                self.telemetry
                    .report_error(ErrorReport::for_app(name, err.to_string()));
                failure = Some(
                    LifecycleError::Broken {
                        app: name.to_string(),
                        phase: "unmount",
                        reason: err.to_string(),
                    }
                    .into(),
                );
            }
        }
        instance.transition(AppStatus::NotMounted)?;

        if let Err(err) = hooks.dispatch(Hook::AfterUnmount, &descriptor).await {
            warn!(app = %name, error = %err, "after_unmount hook rejected");
            self.telemetry
                .report_error(ErrorReport::for_app(name, err.to_string()));
            failure.get_or_insert(err);
        }

        self.containers.hide(instance.container());
        self.instances.lock().remove(name);
        info!(app = %name, "application unloaded");

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Drive a mounted application through `Mounted -> Updating -> Mounted`.
    pub async fn update_app(&self, name: &str, props: Props) -> Result<()> {
        let instance = self.get_instance(name).ok_or_else(|| {
            Error::from(LifecycleError::AppNotFound {
                name: name.to_string(),
            })
        })?;
        let _phase = instance.phase.lock().await;

        let status = instance.status();
        if status != AppStatus::Mounted {
            return Err(LifecycleError::NotMounted {
                app: name.to_string(),
                status,
            }
            .into());
        }

        instance.transition(AppStatus::Updating)?;
        let mut update_props = instance.mount_props(self.state.snapshot());
        update_props.props.extend(props);

        let module = instance.module.lock().await;
        let result = match module.as_ref() {
            Some(module) => module.update(&update_props).await,
            None => Ok(()),
        };
        drop(module);
        instance.transition(AppStatus::Mounted)?;

        result.map_err(|err| {
            self.telemetry
                .report_error(ErrorReport::for_app(name, err.to_string()));
            Error::from(LifecycleError::Broken {
                app: name.to_string(),
                phase: "update",
                reason: err.to_string(),
            })
        })
    }

    /// Merge into the global state and notify every subscriber, including
    /// applications not yet mounted (they receive the snapshot on mount).
    pub fn set_global_state(&self, partial: Props) -> StateSnapshot {
        self.state.set_global_state(partial)
    }

    pub fn on_global_state_change<F>(&self, callback: F) -> StateSubscription
    where
        F: Fn(&StateSnapshot, &StateSnapshot) + Send + Sync + 'static,
    {
        self.state.on_global_state_change(callback)
    }

    pub fn global_state(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    pub fn state_bus(&self) -> Arc<GlobalStateBus> {
        self.state.clone()
    }
}

/// Everything one load needs, cloned out of the registry so the driver task
/// owns its world.
struct Driver {
    instance: Arc<AppInstance>,
    hooks: LifecycleHooks,
    loader: Arc<dyn ModuleLoader>,
    containers: Arc<dyn ContainerHost>,
    state: Arc<GlobalStateBus>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Driver {
    async fn run(self) {
        let _phase = self.instance.phase.lock().await;
        let descriptor = self.instance.descriptor().clone();
        let app = descriptor.name.clone();

        // Source
        if self.instance.transition(AppStatus::LoadingSource).is_err() {
            return;
        }
        if let Err(err) = self.hooks.dispatch(Hook::BeforeLoad, &descriptor).await {
            self.park(AppStatus::LoadError, err);
            return;
        }
        let module = match self.loader.load(&descriptor).await {
            Ok(module) => module,
            Err(err) => {
                self.park(
                    AppStatus::LoadError,
                    LifecycleError::LoadFailed {
                        app: app.clone(),
                        reason: err.to_string(),
                    }
                    .into(),
                );
                return;
            }
        };
        let _ = self.instance.transition(AppStatus::NotBootstrapped);

        // Bootstrap
        let _ = self.instance.transition(AppStatus::Bootstrapping);
        if let Err(err) = module.bootstrap().await {
            self.park(
                AppStatus::SkipBecauseBroken,
                LifecycleError::Broken {
                    app: app.clone(),
                    phase: "bootstrap",
                    reason: err.to_string(),
                }
                .into(),
            );
            return;
        }
        let _ = self.instance.transition(AppStatus::NotMounted);

        // Mount
        if let Err(err) = self.hooks.dispatch(Hook::BeforeMount, &descriptor).await {
            self.park(AppStatus::LoadError, err);
            return;
        }
        self.containers.show(self.instance.container());
        let _ = self.instance.transition(AppStatus::Mounting);
        let props = self.instance.mount_props(self.state.snapshot());
        if let Err(err) = module.mount(&props).await {
            self.containers.hide(self.instance.container());
            self.park(
                AppStatus::SkipBecauseBroken,
                LifecycleError::Broken {
                    app: app.clone(),
                    phase: "mount",
                    reason: err.to_string(),
                }
                .into(),
            );
            return;
        }
        if let Err(err) = self.hooks.dispatch(Hook::AfterMount, &descriptor).await {
            self.containers.hide(self.instance.container());
            self.park(AppStatus::LoadError, err);
            return;
        }

        *self.instance.module.lock().await = Some(module);
        let _ = self.instance.transition(AppStatus::Mounted);
        info!(app = %app, "application mounted");
        self.telemetry.track_event(TelemetryEvent::LifecycleTransition {
            app,
            status: AppStatus::Mounted,
        });
    }

    /// Park the instance in a terminal status, never crashing the registry.
    fn park(&self, status: AppStatus, err: Error) {
        let app = self.instance.name().to_string();
        error!(app = %app, parked = ?status, error = %err, "lifecycle failed");
        self.instance.set_error(err.to_string());
        let _ = self.instance.transition(status);
        self.telemetry
            .report_error(ErrorReport::for_app(&app, err.to_string()));
        self.telemetry
            .track_event(TelemetryEvent::LifecycleTransition { app, status });
    }
}
