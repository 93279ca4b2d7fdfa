//! Module-loader contract: how the host fetches and executes a bundle.

use async_trait::async_trait;

use crate::domain::app::{AppDescriptor, Props};
use crate::domain::state::StateSnapshot;
use crate::error::Result;

/// Everything an application's exported hooks receive on mount and update.
#[derive(Debug, Clone)]
pub struct MountProps {
    /// Container the application renders into.
    pub container: String,
    /// Descriptor props merged with per-load overrides.
    pub props: Props,
    /// Global state at the time of the call, so late-mounting applications
    /// observe earlier writes.
    pub global_state: StateSnapshot,
}

/// A fetched and executed bundle, exposing the four lifecycle exports.
///
/// The engine calls these in the order the lifecycle graph implies and never
/// runs two of them concurrently for one instance.
#[async_trait]
pub trait AppModule: Send + Sync {
    async fn bootstrap(&self) -> Result<()>;

    async fn mount(&self, props: &MountProps) -> Result<()>;

    async fn unmount(&self, props: &MountProps) -> Result<()>;

    /// Optional export; bundles without it accept updates as a no-op.
    async fn update(&self, _props: &MountProps) -> Result<()> {
        Ok(())
    }
}

/// Fetches and executes an application bundle from its entry URL.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, descriptor: &AppDescriptor) -> Result<Box<dyn AppModule>>;
}

/// Container visibility control, owned by the lifecycle engine so container
/// state stays synchronized with application state.
pub trait ContainerHost: Send + Sync {
    fn show(&self, container: &str);
    fn hide(&self, container: &str);
}
