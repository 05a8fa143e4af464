//! Manifest reconciliation against the config store.
//!
//! A pass is bracketed by clear markers:
//!
//! ```text
//! stash AccountID
//! ClearDB, Bootstrap ClearDB = true; ConfigChangeTime = now
//! for each override (sorted): typed compare, maybe set, record "TR181: key value"
//! append tr181.list
//! ClearDBEnd, Bootstrap ClearDBEnd, RFC_CONTROL_RELOADCACHE = true
//! restore AccountID, unless the pass itself wrote it
//! ```

use crate::artifacts::ArtifactStore;
use crate::cache::epoch_seconds;
use crate::telemetry::{markers, Telemetry};
use rfc_store::{ConfigStore, Param};
use rfc_sync_protocol::{is_unknown, keys, OverrideMap};
use tracing::{debug, info, warn};

const TRUE: &str = "true";

/// AccountID captured before the store is cleared.
///
/// Call [`AccountStash::restore`] once the clear bracket is closed, or
/// [`AccountStash::discard`] to drop it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a stash must be restored or discarded"]
pub struct AccountStash {
    account_id: Option<String>,
}

impl AccountStash {
    /// Captures the current AccountID.
    pub fn stash<S: ConfigStore + ?Sized>(store: &S) -> Self {
        let account_id = match store.get_value(keys::ACCOUNT_ID) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "could not read AccountID before clear");
                None
            }
        };
        debug!(account_id = account_id.as_deref().unwrap_or(""), "stashed AccountID");
        Self { account_id }
    }

    /// The captured value, if it is worth restoring.
    pub fn value(&self) -> Option<&str> {
        self.account_id
            .as_deref()
            .filter(|v| !v.is_empty() && !is_unknown(v))
    }

    /// Writes the captured value back. Returns true if a value was restored.
    pub fn restore<S: ConfigStore + ?Sized>(self, store: &S) -> bool {
        let Some(value) = self.value() else {
            debug!("no valid AccountID to restore");
            return false;
        };
        match store.set(keys::OWNER_RFC, keys::ACCOUNT_ID, value) {
            Ok(()) => {
                debug!(account_id = value, "restored AccountID");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to restore AccountID");
                false
            }
        }
    }

    /// Drops the captured value without writing it.
    pub fn discard(self) {}
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys written to the store.
    pub applied: Vec<String>,
    /// Keys whose stored value actually changed.
    pub changed: Vec<String>,
    /// Keys left alone because their value was current.
    pub skipped: Vec<String>,
    /// Keys the store refused, or bootstrap URLs that failed validation.
    pub failed: Vec<String>,
    /// A changed value needs a reboot to take effect.
    pub reboot_required: bool,
    /// The clear bracket was written.
    pub bracketed: bool,
}

/// Applies an [`OverrideMap`] to the store.
pub struct Reconciler<'a, S: ConfigStore + ?Sized, T: Telemetry + ?Sized> {
    store: &'a S,
    telemetry: &'a T,
    artifacts: &'a ArtifactStore,
    maintenance_enabled: bool,
}

impl<'a, S: ConfigStore + ?Sized, T: Telemetry + ?Sized> Reconciler<'a, S, T> {
    /// Creates a reconciler.
    pub fn new(store: &'a S, telemetry: &'a T, artifacts: &'a ArtifactStore) -> Self {
        Self {
            store,
            telemetry,
            artifacts,
            maintenance_enabled: false,
        }
    }

    /// Changed values request a reboot when maintenance is enabled.
    pub fn with_maintenance(mut self, enabled: bool) -> Self {
        self.maintenance_enabled = enabled;
        self
    }

    /// Applies `overrides`.
    ///
    /// `probe` validates a new bootstrap URL before it is stored; a failed
    /// probe skips that key. An empty map is a no-op with no bracket.
    pub fn apply(
        &self,
        overrides: &OverrideMap,
        probe: &mut dyn FnMut(&str) -> bool,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        if overrides.is_empty() {
            debug!("override map is empty, nothing to reconcile");
            return report;
        }

        let stash = AccountStash::stash(self.store);
        self.clear_begin();
        report.bracketed = true;

        let mut lines = Vec::with_capacity(overrides.len());
        for (key, value) in overrides.iter() {
            if let Some(line) = self.apply_one(key, value, probe, &mut report) {
                lines.push(line);
            }
        }

        if let Err(e) = self.artifacts.append_tr181(&lines) {
            warn!(error = %e, "failed to write tr181 list");
        }
        self.clear_end();

        if report.applied.iter().any(|k| keys::is_account_key(k)) {
            stash.discard();
        } else {
            stash.restore(self.store);
        }
        info!(
            applied = report.applied.len(),
            changed = report.changed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "reconciliation complete"
        );
        report
    }

    fn apply_one(
        &self,
        key: &str,
        value: &str,
        probe: &mut dyn FnMut(&str) -> bool,
        report: &mut ReconcileReport,
    ) -> Option<String> {
        let current = match self.store.get(key) {
            Ok(current) => current,
            Err(e) => {
                warn!(key, error = %e, "read failed, applying override");
                None
            }
        };

        let mut value = value.to_string();
        if keys::is_account_key(key) && is_unknown(&value) {
            if let Some(current) = current
                .as_ref()
                .map(Param::unquoted)
                .filter(|c| !c.is_empty())
            {
                debug!(key, current, "keeping AccountID over Unknown");
                value = current.to_string();
            }
        }

        let unchanged = current.as_ref().is_some_and(|p| p.matches(&value));
        let always = keys::is_managed(key) || self.artifacts.bootstrap_contains(key);
        if unchanged && !always {
            debug!(key, "value unchanged");
            report.skipped.push(key.to_string());
            return Some(tr181_line(key, &value));
        }

        if key == keys::BOOTSTRAP_XCONF_URL && !probe(&value) {
            warn!(key, url = %value, "bootstrap URL failed validation, not stored");
            report.failed.push(key.to_string());
            return None;
        }

        if let Err(e) = self.store.set(keys::OWNER_RFC, key, &value) {
            warn!(key, error = %e, "set failed");
            report.failed.push(key.to_string());
            return Some(tr181_line(key, &value));
        }
        report.applied.push(key.to_string());

        if unchanged {
            debug!(key, "reapplied same value");
        } else {
            info!(
                key,
                old = current.as_ref().map(Param::unquoted).unwrap_or(""),
                new = %value,
                "parameter updated"
            );
            report.changed.push(key.to_string());
            self.on_changed(key, &value, report);
        }
        Some(tr181_line(key, &value))
    }

    fn on_changed(&self, key: &str, value: &str, report: &mut ReconcileReport) {
        if key == keys::TELEMETRY_CONFIG_URL {
            if value.starts_with("https://") {
                self.telemetry.config_url_changed();
            } else {
                info!(url = value, "invalid telemetry config URL, not notifying");
            }
        }
        if keys::is_account_key(key) {
            self.telemetry.count(markers::ACCOUNT_SET);
        }
        if self.maintenance_enabled {
            report.reboot_required = true;
        }
    }

    fn clear_begin(&self) {
        let now = epoch_seconds().to_string();
        for (key, value) in [
            (keys::CLEAR_DB, TRUE),
            (keys::BOOTSTRAP_CLEAR_DB, TRUE),
            (keys::CONFIG_CHANGE_TIME, now.as_str()),
        ] {
            self.set_marker(key, value);
        }
    }

    fn clear_end(&self) {
        for key in [keys::CLEAR_DB_END, keys::BOOTSTRAP_CLEAR_DB_END, keys::RELOAD_CACHE] {
            self.set_marker(key, TRUE);
        }
    }

    fn set_marker(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(keys::OWNER_RFC, key, value) {
            warn!(key, error = %e, "failed to write clear marker");
        }
    }
}

fn tr181_line(key: &str, value: &str) -> String {
    format!("TR181: {key} {value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::MemoryTelemetry;
    use proptest::prelude::*;
    use rfc_store::{IniConfigStore, MemoryConfigStore};
    use rfc_testkit::generators::{
        managed_key_strategy, override_value_strategy, plain_overrides_strategy,
    };
    use std::fs;
    use tempfile::tempdir;

    const LSA_ENABLE: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.LSA.Enable";
    const BOOTSTRAP_PARTNER: &str =
        "Device.DeviceInfo.X_RDKCENTRAL-COM_Syndication.PartnerProductName";

    fn overrides(pairs: &[(&str, &str)]) -> OverrideMap {
        pairs.iter().copied().collect()
    }

    fn accept(_: &str) -> bool {
        true
    }

    #[test]
    fn empty_map_writes_nothing() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new();
        let telemetry = MemoryTelemetry::new();
        let report = Reconciler::new(&store, &telemetry, &artifacts)
            .apply(&OverrideMap::new(), &mut accept);
        assert!(!report.bracketed);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn bracket_order() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new().with_entry(keys::ACCOUNT_ID, "1234");
        let telemetry = MemoryTelemetry::new();
        Reconciler::new(&store, &telemetry, &artifacts)
            .apply(&overrides(&[("Warrens", "Feature")]), &mut accept);

        let names: Vec<String> = store.writes().into_iter().map(|w| w.name).collect();
        assert_eq!(
            names,
            vec![
                keys::CLEAR_DB.to_string(),
                keys::BOOTSTRAP_CLEAR_DB.to_string(),
                keys::CONFIG_CHANGE_TIME.to_string(),
                "Warrens".to_string(),
                keys::CLEAR_DB_END.to_string(),
                keys::BOOTSTRAP_CLEAR_DB_END.to_string(),
                keys::RELOAD_CACHE.to_string(),
                keys::ACCOUNT_ID.to_string(),
            ]
        );
        assert_eq!(store.value(keys::ACCOUNT_ID).as_deref(), Some("1234"));
    }

    #[test]
    fn unknown_account_is_not_restored() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new().with_entry(keys::ACCOUNT_ID, "Unknown");
        let telemetry = MemoryTelemetry::new();
        Reconciler::new(&store, &telemetry, &artifacts)
            .apply(&overrides(&[("Warrens", "Feature")]), &mut accept);
        assert!(store.writes_to(keys::ACCOUNT_ID).is_empty());
    }

    #[test]
    fn unchanged_plain_key_is_skipped_but_managed_key_reapplied() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new()
            .with_entry("Warrens", "Feature")
            .with_entry(LSA_ENABLE, "true");
        let telemetry = MemoryTelemetry::new();
        let report = Reconciler::new(&store, &telemetry, &artifacts).apply(
            &overrides(&[("Warrens", "Feature"), (LSA_ENABLE, "true")]),
            &mut accept,
        );

        assert_eq!(report.skipped, vec!["Warrens".to_string()]);
        assert_eq!(report.applied, vec![LSA_ENABLE.to_string()]);
        assert!(report.changed.is_empty());
        assert!(store.writes_to("Warrens").is_empty());

        let list = fs::read_to_string(artifacts.tr181_list_path()).unwrap();
        assert_eq!(
            list,
            format!("TR181: {LSA_ENABLE} true\nTR181: Warrens Feature\n")
        );
    }

    #[test]
    fn padded_value_is_unchanged_on_later_passes() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path().join("RFC"));
        let store = IniConfigStore::open(&dir.path().join("tr181store.ini")).unwrap();
        let telemetry = MemoryTelemetry::new();
        let reconciler = Reconciler::new(&store, &telemetry, &artifacts).with_maintenance(true);
        let map = overrides(&[("Device.Plain.Key", "on ")]);

        let first = reconciler.apply(&map, &mut accept);
        assert_eq!(first.changed, vec!["Device.Plain.Key".to_string()]);
        assert!(first.reboot_required);

        for _ in 0..2 {
            let again = reconciler.apply(&map, &mut accept);
            assert!(again.changed.is_empty());
            assert_eq!(again.skipped, vec!["Device.Plain.Key".to_string()]);
            assert!(!again.reboot_required);
        }
        assert_eq!(store.get_value("Device.Plain.Key").unwrap().as_deref(), Some("on "));
    }

    #[test]
    fn typed_equal_value_is_skipped() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new()
            .with_entry("Device.Plain.Enable", "TRUE")
            .with_entry("Device.Plain.Count", "\"010\"");
        let telemetry = MemoryTelemetry::new();
        let report = Reconciler::new(&store, &telemetry, &artifacts).apply(
            &overrides(&[("Device.Plain.Enable", "true"), ("Device.Plain.Count", "10")]),
            &mut accept,
        );
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn bootstrap_key_is_reapplied() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bootstrap.ini"), "Device.Boot.Key=1\n").unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new().with_entry("Device.Boot.Key", "1");
        let telemetry = MemoryTelemetry::new();
        let report = Reconciler::new(&store, &telemetry, &artifacts)
            .apply(&overrides(&[("Device.Boot.Key", "1")]), &mut accept);
        assert_eq!(report.applied, vec!["Device.Boot.Key".to_string()]);
    }

    #[test]
    fn account_change_counts_and_maintenance_requests_reboot() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new().with_entry(keys::ACCOUNT_ID, "1111");
        let telemetry = MemoryTelemetry::new();
        let report = Reconciler::new(&store, &telemetry, &artifacts)
            .with_maintenance(true)
            .apply(&overrides(&[(keys::ACCOUNT_ID, "2222")]), &mut accept);

        assert_eq!(store.value(keys::ACCOUNT_ID).as_deref(), Some("2222"));
        assert_eq!(store.writes_to(keys::ACCOUNT_ID).len(), 1);
        assert_eq!(telemetry.counts(markers::ACCOUNT_SET), 1);
        assert!(report.reboot_required);
    }

    #[test]
    fn unknown_account_keeps_current() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new().with_entry(keys::ACCOUNT_ID, "1111");
        let telemetry = MemoryTelemetry::new();
        let report = Reconciler::new(&store, &telemetry, &artifacts)
            .with_maintenance(true)
            .apply(&overrides(&[(keys::ACCOUNT_ID, "Unknown")]), &mut accept);

        assert_eq!(store.value(keys::ACCOUNT_ID).as_deref(), Some("1111"));
        assert_eq!(telemetry.counts(markers::ACCOUNT_SET), 0);
        assert!(!report.reboot_required);
    }

    #[test]
    fn failed_probe_skips_bootstrap_url() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new();
        let telemetry = MemoryTelemetry::new();
        let mut probed = Vec::new();
        let mut reject = |url: &str| {
            probed.push(url.to_string());
            false
        };
        let report = Reconciler::new(&store, &telemetry, &artifacts).apply(
            &overrides(&[(keys::BOOTSTRAP_XCONF_URL, "https://bad.example.com")]),
            &mut reject,
        );

        assert_eq!(probed, vec!["https://bad.example.com".to_string()]);
        assert_eq!(report.failed, vec![keys::BOOTSTRAP_XCONF_URL.to_string()]);
        assert!(store.writes_to(keys::BOOTSTRAP_XCONF_URL).is_empty());
        assert!(!artifacts.tr181_list_path().exists());
        assert_eq!(store.value(keys::RELOAD_CACHE).as_deref(), Some("true"));
    }

    #[test]
    fn rejected_write_is_reported() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new();
        store.reject_writes_to("Warrens");
        let telemetry = MemoryTelemetry::new();
        let report = Reconciler::new(&store, &telemetry, &artifacts)
            .apply(&overrides(&[("Warrens", "Feature")]), &mut accept);
        assert_eq!(report.failed, vec!["Warrens".to_string()]);
        assert!(report.applied.is_empty());
    }

    #[test]
    fn https_telemetry_url_notifies() {
        let dir = tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path());
        let store = MemoryConfigStore::new();
        let telemetry = MemoryTelemetry::new();
        Reconciler::new(&store, &telemetry, &artifacts).apply(
            &overrides(&[(keys::TELEMETRY_CONFIG_URL, "https://t2.example.com")]),
            &mut accept,
        );
        assert_eq!(telemetry.config_url_changes(), 1);

        let telemetry = MemoryTelemetry::new();
        Reconciler::new(&store, &telemetry, &artifacts).apply(
            &overrides(&[(keys::TELEMETRY_CONFIG_URL, "http://t2.example.com")]),
            &mut accept,
        );
        assert_eq!(telemetry.config_url_changes(), 0);
    }

    #[test]
    fn stash_values() {
        let store = MemoryConfigStore::new().with_entry(keys::ACCOUNT_ID, "\"4123705941507160513\"");
        let stash = AccountStash::stash(&store);
        assert_eq!(stash.value(), Some("4123705941507160513"));
        stash.discard();
        assert_eq!(store.write_count(), 0);

        let empty = AccountStash::stash(&MemoryConfigStore::new());
        assert_eq!(empty.value(), None);
        assert!(!empty.restore(&store));
    }

    proptest! {
        #[test]
        fn unchanged_overrides_touch_only_reapplied_keys(
            plain in plain_overrides_strategy(),
            managed in managed_key_strategy(),
            managed_value in override_value_strategy(),
            bootstrap_value in override_value_strategy(),
        ) {
            let dir = tempdir().unwrap();
            fs::write(
                dir.path().join("bootstrap.ini"),
                format!("{BOOTSTRAP_PARTNER}={bootstrap_value}\n"),
            )
            .unwrap();
            let artifacts = ArtifactStore::new(dir.path());
            prop_assume!(plain.iter().all(|(k, _)| !artifacts.bootstrap_contains(k)));

            let store = MemoryConfigStore::new();
            let mut map = OverrideMap::new();
            let reapplied = [
                (managed.as_str(), managed_value.as_str()),
                (BOOTSTRAP_PARTNER, bootstrap_value.as_str()),
            ];
            for (key, value) in plain
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .chain(reapplied)
            {
                store.insert(key, value);
                map.insert(key, value);
            }

            let telemetry = MemoryTelemetry::new();
            let report = Reconciler::new(&store, &telemetry, &artifacts)
                .with_maintenance(true)
                .apply(&map, &mut accept);

            for (key, _) in &plain {
                prop_assert!(store.writes_to(key).is_empty());
            }
            prop_assert_eq!(store.writes_to(&managed).len(), 1);
            prop_assert_eq!(store.writes_to(BOOTSTRAP_PARTNER).len(), 1);
            prop_assert_eq!(report.skipped.len(), plain.len());
            prop_assert!(report.changed.is_empty());
            prop_assert!(!report.reboot_required);
        }
    }
}
