//! Telemetry sink: fire-and-forget reporting at lifecycle and error points.

use crate::domain::app::AppStatus;
use crate::domain::network::NetworkStatus;
use crate::domain::preload::Priority;

/// An error surfaced to the telemetry backend.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Application the error is scoped to, when there is one.
    pub app: Option<String>,
    pub message: String,
}

impl ErrorReport {
    pub fn for_app(app: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            app: Some(app.into()),
            message: message.into(),
        }
    }
}

/// Structured events the core emits as it works.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    LifecycleTransition { app: String, status: AppStatus },
    PreloadQueued { app: String, priority: Priority },
    PreloadCompleted { app: String, duration_ms: u64 },
    PreloadFailed { app: String, reason: String },
    NetworkStatusChanged { status: NetworkStatus },
}

/// Outbound telemetry. Implementations must never block or fail the caller;
/// batching, transport, and retries live behind this boundary.
pub trait TelemetrySink: Send + Sync {
    fn report_error(&self, report: ErrorReport);

    fn track_event(&self, event: TelemetryEvent);

    fn track_page_view(&self, path: &str);
}
