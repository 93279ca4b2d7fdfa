use thiserror::Error;

use crate::domain::app::AppStatus;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Lifecycle errors scoped to a single application instance.
///
/// None of these are fatal to the registry: a broken instance parks in a
/// terminal status while every other instance keeps running.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("application not registered: {name}")]
    AppNotFound { name: String },

    #[error("lifecycle hook '{hook}' failed for {app}: {reason}")]
    HookFailed {
        hook: &'static str,
        app: String,
        reason: String,
    },

    #[error("failed to load {app}: {reason}")]
    LoadFailed { app: String, reason: String },

    #[error("{app} broke during {phase}: {reason}")]
    Broken {
        app: String,
        phase: &'static str,
        reason: String,
    },

    #[error("invalid status transition for {app}: {from:?} -> {to:?}")]
    InvalidTransition {
        app: String,
        from: AppStatus,
        to: AppStatus,
    },

    #[error("{app} is not mounted (status {status:?})")]
    NotMounted { app: String, status: AppStatus },
}

/// Preload failures, scoped to a single task and never user-visible.
#[derive(Error, Debug, Clone)]
pub enum PreloadError {
    #[error("prefetch timed out for {url}")]
    Timeout { url: String },

    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("application not registered: {app}")]
    UnknownApp { app: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Preload(#[from] PreloadError),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
