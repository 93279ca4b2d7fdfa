//! Application descriptors and the lifecycle status graph.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Free-form properties handed to an application on mount/update.
pub type Props = Map<String, Value>;

/// Static description of a registered micro application.
///
/// Immutable after registration; re-registering the same name replaces the
/// descriptor without touching an already-running instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppDescriptor {
    /// Unique application name.
    pub name: String,
    /// Entry document URL the bundle is served from.
    pub entry: Url,
    /// Host container the application mounts into.
    pub container: String,
    /// Route prefix this application owns.
    pub active_rule: String,
    /// Default props merged into every mount.
    #[serde(default)]
    pub props: Props,
}

impl AppDescriptor {
    pub fn new(
        name: impl Into<String>,
        entry: Url,
        container: impl Into<String>,
        active_rule: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entry,
            container: container.into(),
            active_rule: active_rule.into(),
            props: Props::new(),
        }
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Whether this application owns the given route.
    pub fn matches_path(&self, path: &str) -> bool {
        !self.active_rule.is_empty() && path.starts_with(&self.active_rule)
    }
}

/// Lifecycle status of one application instance.
///
/// The happy path runs `NotLoaded` through `Mounted`, optionally cycling
/// through `Updating`, and back to `NotMounted` after an unmount. `LoadError`
/// and `SkipBecauseBroken` are terminal and reachable from every loading,
/// bootstrapping, and mounting step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppStatus {
    NotLoaded,
    LoadingSource,
    NotBootstrapped,
    Bootstrapping,
    NotMounted,
    Mounting,
    Mounted,
    Updating,
    Unmounting,
    LoadError,
    SkipBecauseBroken,
}

impl AppStatus {
    /// Terminal statuses park the instance until it is evicted.
    pub fn is_terminal(self) -> bool {
        matches!(self, AppStatus::LoadError | AppStatus::SkipBecauseBroken)
    }

    /// Whether the instance has finished fetching and executing its source.
    pub fn is_loaded(self) -> bool {
        !matches!(
            self,
            AppStatus::NotLoaded
                | AppStatus::LoadingSource
                | AppStatus::LoadError
                | AppStatus::SkipBecauseBroken
        )
    }

    /// Whether the bootstrap phase has completed.
    pub fn is_bootstrapped(self) -> bool {
        self.is_loaded() && !matches!(self, AppStatus::NotBootstrapped | AppStatus::Bootstrapping)
    }

    /// Edge relation of the lifecycle graph.
    pub fn can_transition_to(self, next: AppStatus) -> bool {
        use AppStatus::*;
        matches!(
            (self, next),
            (NotLoaded, LoadingSource)
                | (LoadingSource, NotBootstrapped)
                | (NotBootstrapped, Bootstrapping)
                | (Bootstrapping, NotMounted)
                | (NotMounted, Mounting)
                | (Mounting, Mounted)
                | (Mounted, Updating)
                | (Updating, Mounted)
                | (Mounted, Unmounting)
                | (Unmounting, NotMounted)
                | (
                    LoadingSource | NotBootstrapped | Bootstrapping | NotMounted | Mounting,
                    LoadError | SkipBecauseBroken,
                )
        )
    }
}
