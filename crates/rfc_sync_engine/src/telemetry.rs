//! Telemetry sink for sync events.

use parking_lot::Mutex;
use tracing::info;

/// Marker names emitted by the agent.
pub mod markers {
    /// Value: the local override URL in use.
    pub const XCONF_LOCAL_URL: &str = "SYST_INFO_RFC_XconflocalURL";
    /// Value: the bootstrap URL in use.
    pub const XCONF_BS_URL: &str = "SYST_INFO_RFC_XconfBSURL";
    /// Count: a manifest was applied.
    pub const COMPLETE: &str = "SYST_INFO_RFC_Complete";
    /// Count: the server has no features for this device.
    pub const FEATURES_NONE: &str = "SYST_INFO_RFC_FeaturesNone";
    /// Count: the account identifier changed.
    pub const ACCOUNT_SET: &str = "SYST_INFO_ACCID_set";
    /// Count: a reboot is needed for applied changes.
    pub const REBOOT_REQUIRED: &str = "SYST_ERR_RFC_Reboot";
    /// Value: transport failure code and host.
    pub const CERT_ERROR: &str = "certerr_split";
    /// Value: active feature list after a 304.
    pub const ACTIVE_FEATURES: &str = "rfc_split";
    /// Value: feature list staged from a fresh manifest.
    pub const STAGED_FEATURES: &str = "rfc_staging_split";
}

/// Receives counters and values emitted during a cycle.
///
/// Emission is fire-and-forget; implementations must not fail the cycle.
pub trait Telemetry: Send + Sync {
    /// Increments a counter marker.
    fn count(&self, marker: &str);

    /// Reports a string value under a marker.
    fn value(&self, marker: &str, value: &str);

    /// Reports a transport failure against `host`.
    fn transport_error(&self, code: i32, host: &str) {
        self.value(markers::CERT_ERROR, &format!("RFC, {code}, {host}"));
    }

    /// Notifies the telemetry service that its profile URL changed.
    fn config_url_changed(&self) {}
}

impl<T: Telemetry + ?Sized> Telemetry for std::sync::Arc<T> {
    fn count(&self, marker: &str) {
        (**self).count(marker)
    }

    fn value(&self, marker: &str, value: &str) {
        (**self).value(marker, value)
    }

    fn transport_error(&self, code: i32, host: &str) {
        (**self).transport_error(code, host)
    }

    fn config_url_changed(&self) {
        (**self).config_url_changed()
    }
}

/// Telemetry that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn count(&self, marker: &str) {
        info!(marker, "telemetry count");
    }

    fn value(&self, marker: &str, value: &str) {
        info!(marker, value, "telemetry value");
    }

    fn config_url_changed(&self) {
        info!("telemetry profile URL changed");
    }
}

/// A recorded telemetry emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    /// A counter increment.
    Count(String),
    /// A reported value.
    Value(String, String),
    /// A profile reload notification.
    ConfigUrlChanged,
}

/// In-memory telemetry for tests.
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemoryTelemetry {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event in emission order.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    /// Number of increments of `marker`.
    pub fn counts(&self, marker: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, TelemetryEvent::Count(m) if m == marker))
            .count()
    }

    /// Values reported under `marker`, oldest first.
    pub fn values(&self, marker: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TelemetryEvent::Value(m, v) if m == marker => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of profile reload notifications.
    pub fn config_url_changes(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, TelemetryEvent::ConfigUrlChanged))
            .count()
    }
}

impl Telemetry for MemoryTelemetry {
    fn count(&self, marker: &str) {
        self.events
            .lock()
            .push(TelemetryEvent::Count(marker.to_string()));
    }

    fn value(&self, marker: &str, value: &str) {
        self.events
            .lock()
            .push(TelemetryEvent::Value(marker.to_string(), value.to_string()));
    }

    fn config_url_changed(&self) {
        self.events.lock().push(TelemetryEvent::ConfigUrlChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_events() {
        let telemetry = MemoryTelemetry::new();
        telemetry.count(markers::COMPLETE);
        telemetry.count(markers::COMPLETE);
        telemetry.value(markers::ACTIVE_FEATURES, "a=true,");
        telemetry.config_url_changed();

        assert_eq!(telemetry.counts(markers::COMPLETE), 2);
        assert_eq!(telemetry.values(markers::ACTIVE_FEATURES), vec!["a=true,"]);
        assert_eq!(telemetry.config_url_changes(), 1);
        assert_eq!(telemetry.events().len(), 4);
    }

    #[test]
    fn transport_error_format() {
        let telemetry = MemoryTelemetry::new();
        telemetry.transport_error(60, "https://xconf.example.com");
        assert_eq!(
            telemetry.values(markers::CERT_ERROR),
            vec!["RFC, 60, https://xconf.example.com"]
        );
    }
}
