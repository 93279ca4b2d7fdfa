//! Scripted module loader with a shared call journal.
//!
//! Every lifecycle call appends `"{app}:{phase}"` to the journal, so tests
//! can assert exact call ordering across hooks and exports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::app::AppDescriptor;
use crate::domain::state::StateSnapshot;
use crate::error::{Error, LifecycleError, Result};
use crate::port::loader::{AppModule, ModuleLoader, MountProps};

/// Ordered record of every loader and module call.
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().iter().any(|e| e == entry)
    }

    /// Count of entries equal to `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }
}

/// Per-app failure and delay script.
#[derive(Clone, Default)]
struct Script {
    fail_load: Option<String>,
    fail_bootstrap: Option<String>,
    fail_mount: Option<String>,
    fail_unmount: Option<String>,
    load_delay: Option<Duration>,
    mount_delay: Option<Duration>,
}

/// A [`ModuleLoader`] that fabricates journaling modules, with per-app
/// scripted failures and delays.
pub struct ScriptedLoader {
    journal: Journal,
    scripts: Mutex<HashMap<String, Script>>,
    load_calls: Mutex<HashMap<String, Arc<AtomicU32>>>,
    mounted_state: Arc<Mutex<HashMap<String, StateSnapshot>>>,
}

impl ScriptedLoader {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            scripts: Mutex::new(HashMap::new()),
            load_calls: Mutex::new(HashMap::new()),
            mounted_state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn fail_load(self, app: &str, reason: &str) -> Self {
        self.script(app, |s| s.fail_load = Some(reason.to_string()));
        self
    }

    pub fn fail_bootstrap(self, app: &str, reason: &str) -> Self {
        self.script(app, |s| s.fail_bootstrap = Some(reason.to_string()));
        self
    }

    pub fn fail_mount(self, app: &str, reason: &str) -> Self {
        self.script(app, |s| s.fail_mount = Some(reason.to_string()));
        self
    }

    pub fn fail_unmount(self, app: &str, reason: &str) -> Self {
        self.script(app, |s| s.fail_unmount = Some(reason.to_string()));
        self
    }

    pub fn load_delay(self, app: &str, delay: Duration) -> Self {
        self.script(app, |s| s.load_delay = Some(delay));
        self
    }

    pub fn mount_delay(self, app: &str, delay: Duration) -> Self {
        self.script(app, |s| s.mount_delay = Some(delay));
        self
    }

    fn script(&self, app: &str, configure: impl FnOnce(&mut Script)) {
        configure(self.scripts.lock().entry(app.to_string()).or_default());
    }

    /// How many times `load` ran for `app`.
    pub fn load_count(&self, app: &str) -> u32 {
        self.load_calls
            .lock()
            .get(app)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Global state the module observed when it mounted.
    pub fn mounted_state(&self, app: &str) -> Option<StateSnapshot> {
        self.mounted_state.lock().get(app).cloned()
    }
}

#[async_trait]
impl ModuleLoader for ScriptedLoader {
    async fn load(&self, descriptor: &AppDescriptor) -> Result<Box<dyn AppModule>> {
        let name = descriptor.name.clone();
        let script = self
            .scripts
            .lock()
            .get(&name)
            .cloned()
            .unwrap_or_default();
        self.load_calls
            .lock()
            .entry(name.clone())
            .or_insert_with(|| Arc::new(AtomicU32::new(0)))
            .fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("{name}:load"));
        if let Some(delay) = script.load_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = script.fail_load {
            return Err(Error::from(LifecycleError::LoadFailed { app: name, reason }));
        }
        Ok(Box::new(ScriptedModule {
            name,
            script,
            journal: self.journal.clone(),
            mounted_state: self.mounted_state.clone(),
        }))
    }
}

/// Module whose lifecycle exports journal their calls and honor the script.
pub struct ScriptedModule {
    name: String,
    script: Script,
    journal: Journal,
    mounted_state: Arc<Mutex<HashMap<String, StateSnapshot>>>,
}

impl ScriptedModule {
    fn fail(&self, phase: &'static str, reason: &str) -> Error {
        Error::from(LifecycleError::Broken {
            app: self.name.clone(),
            phase,
            reason: reason.to_string(),
        })
    }
}

#[async_trait]
impl AppModule for ScriptedModule {
    async fn bootstrap(&self) -> Result<()> {
        self.journal.push(format!("{}:bootstrap", self.name));
        match &self.script.fail_bootstrap {
            Some(reason) => Err(self.fail("bootstrap", reason)),
            None => Ok(()),
        }
    }

    async fn mount(&self, props: &MountProps) -> Result<()> {
        self.journal.push(format!("{}:mount", self.name));
        if let Some(delay) = self.script.mount_delay {
            tokio::time::sleep(delay).await;
        }
        self.mounted_state
            .lock()
            .insert(self.name.clone(), props.global_state.clone());
        match &self.script.fail_mount {
            Some(reason) => Err(self.fail("mount", reason)),
            None => Ok(()),
        }
    }

    async fn unmount(&self, _props: &MountProps) -> Result<()> {
        self.journal.push(format!("{}:unmount", self.name));
        match &self.script.fail_unmount {
            Some(reason) => Err(self.fail("unmount", reason)),
            None => Ok(()),
        }
    }

    async fn update(&self, _props: &MountProps) -> Result<()> {
        self.journal.push(format!("{}:update", self.name));
        Ok(())
    }
}
