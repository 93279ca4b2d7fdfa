//! Recording implementations of the host-facing ports.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::port::loader::ContainerHost;
use crate::port::telemetry::{ErrorReport, TelemetryEvent, TelemetrySink};

/// Container host that records show/hide calls and tracks visibility.
#[derive(Default)]
pub struct RecordingContainerHost {
    calls: Mutex<Vec<String>>,
    visible: Mutex<HashSet<String>>,
}

impl RecordingContainerHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn is_visible(&self, container: &str) -> bool {
        self.visible.lock().contains(container)
    }
}

impl ContainerHost for RecordingContainerHost {
    fn show(&self, container: &str) {
        self.calls.lock().push(format!("show:{container}"));
        self.visible.lock().insert(container.to_string());
    }

    fn hide(&self, container: &str) {
        self.calls.lock().push(format!("hide:{container}"));
        self.visible.lock().remove(container);
    }
}

/// Telemetry sink that collects everything for later assertions.
#[derive(Default)]
pub struct CollectingTelemetry {
    errors: Mutex<Vec<ErrorReport>>,
    events: Mutex<Vec<TelemetryEvent>>,
    page_views: Mutex<Vec<String>>,
}

impl CollectingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<ErrorReport> {
        self.errors.lock().clone()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn page_views(&self) -> Vec<String> {
        self.page_views.lock().clone()
    }
}

impl TelemetrySink for CollectingTelemetry {
    fn report_error(&self, report: ErrorReport) {
        self.errors.lock().push(report);
    }

    fn track_event(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }

    fn track_page_view(&self, path: &str) {
        self.page_views.lock().push(path.to_string());
    }
}
