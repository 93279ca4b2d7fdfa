//! Default no-op implementations of the outbound host hooks.

use tracing::{debug, warn};

use crate::port::loader::ContainerHost;
use crate::port::telemetry::{ErrorReport, TelemetryEvent, TelemetrySink};

/// Logs telemetry locally instead of shipping it anywhere.
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn report_error(&self, report: ErrorReport) {
        warn!(app = ?report.app, message = %report.message, "error reported");
    }

    fn track_event(&self, event: TelemetryEvent) {
        debug!(?event, "telemetry event");
    }

    fn track_page_view(&self, path: &str) {
        debug!(path, "page view");
    }
}

/// Container host that assumes containers are always present and visible.
pub struct NoopContainerHost;

impl ContainerHost for NoopContainerHost {
    fn show(&self, container: &str) {
        debug!(container, "show container");
    }

    fn hide(&self, container: &str) {
        debug!(container, "hide container");
    }
}
