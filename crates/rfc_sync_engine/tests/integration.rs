//! End-to-end sync cycles against a scripted transport.

use rfc_sync_engine::{CycleStatus, SyncState};
use rfc_sync_protocol::{BuildClass, DeviceIdentity, CLEARED_HASH};
use rfc_testkit::prelude::*;
use std::fs;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

/// A harness whose firmware was already processed and whose account is known.
fn settled() -> TestHarness {
    let harness = TestHarness::new()
        .with_store(MemoryConfigStore::new().with_entry(keys::ACCOUNT_ID, SAMPLE_ACCOUNT_ID));
    harness.mark_firmware_processed();
    harness
}

/// A non-production harness; cycles run in the local lane.
fn local_lane() -> TestHarness {
    let harness = TestHarness::new().with_identity(
        DeviceIdentity::new(TEST_MAC, TEST_FIRMWARE)
            .with_build_class(BuildClass::Dev)
            .with_partner_id("comcast"),
    );
    harness.mark_firmware_processed();
    harness.store.insert(keys::ACCOUNT_ID, "1234");
    harness
}

#[test]
fn first_boot_applies_sample_manifest() {
    let harness = TestHarness::new();
    harness
        .transport
        .push_response(applied_response(SAMPLE_MANIFEST, "H1"));
    harness
        .transport
        .push_response(applied_response(SAMPLE_MANIFEST, "H1"));

    let outcome = harness.engine().sync().unwrap();

    assert_eq!(outcome.status, CycleStatus::Applied);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.features.as_deref(), Some(SAMPLE_FEATURE_LIST));

    let artifacts = harness.artifacts();
    let list = fs::read_to_string(artifacts.feature_list_path()).unwrap();
    assert_eq!(list.trim_end(), SAMPLE_FEATURE_LIST);
    assert!(artifacts.feature_file_path("ARU").exists());
    assert!(artifacts.feature_file_path("Telemetry_2.0-31099").exists());
    assert_eq!(artifacts.last_firmware().as_deref(), Some(TEST_FIRMWARE));

    let tr181 = fs::read_to_string(artifacts.tr181_list_path()).unwrap();
    assert_eq!(tr181.lines().count(), SAMPLE_OVERRIDE_COUNT);

    assert_eq!(
        harness.store.value(keys::ACCOUNT_ID).as_deref(),
        Some(SAMPLE_ACCOUNT_ID)
    );
    assert_eq!(harness.store.value(keys::CONFIG_SET_HASH).as_deref(), Some("H1"));
    assert_eq!(harness.store.value(keys::XCONF_SELECTOR).as_deref(), Some("prod"));
    assert_eq!(
        harness.store.value(keys::XCONF_URL).as_deref(),
        Some(DEFAULT_SERVER_URL)
    );

    assert_eq!(harness.telemetry.counts(markers::COMPLETE), 1);
    assert_eq!(harness.telemetry.counts(markers::ACCOUNT_SET), 1);
    assert_eq!(
        harness.telemetry.values(markers::STAGED_FEATURES),
        vec![SAMPLE_FEATURE_LIST.to_string()]
    );
}

#[test]
fn identity_correction_repeats_request() {
    let harness = TestHarness::new();
    harness
        .transport
        .set_fallback(Ok(applied_response(SAMPLE_MANIFEST, "H1")));

    harness.engine().sync().unwrap();

    let requests = harness.transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.contains("accountId=Unknown"));
    assert!(requests[1]
        .url
        .contains(&format!("accountId={SAMPLE_ACCOUNT_ID}")));
    assert!(requests[1].url.contains("partnerId=comcast"));
}

#[test]
fn special_characters_never_become_identity() {
    let harness = TestHarness::new();
    let body = ManifestBuilder::new()
        .feature(
            "AccountId",
            Some("AccountId"),
            &[(
                "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.AccountInfo.AccountID",
                "12;34",
            )],
        )
        .build();
    harness.transport.set_fallback(Ok(applied_response(body, "H1")));

    harness.engine().sync().unwrap();

    for request in harness.transport.requests() {
        assert!(request.url.contains("accountId=Unknown"));
        assert!(!request.url.contains("12%3B34"));
    }
}

#[test]
fn not_modified_writes_nothing() {
    let harness = settled();
    harness
        .artifacts()
        .write_feature_list(SAMPLE_FEATURE_LIST)
        .unwrap();
    harness.transport.push_response(FetchResponse::status(304));

    let outcome = harness.engine().sync().unwrap();

    assert_eq!(outcome.status, CycleStatus::NoUpdate);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(harness.store.write_count(), 0);
    assert_eq!(
        harness.telemetry.values(markers::ACTIVE_FEATURES),
        vec![SAMPLE_FEATURE_LIST.to_string()]
    );
    assert!(harness.telemetry.values(markers::STAGED_FEATURES).is_empty());
}

#[test]
fn not_found_purges_feature_artifacts() {
    let harness = settled();
    let artifacts = harness.artifacts();
    fs::create_dir_all(artifacts.dir()).unwrap();
    fs::write(artifacts.feature_file_path("ARU"), "export RFC_ENABLE_ARU=true\n").unwrap();
    fs::write(artifacts.variables_path(), "export RFC_ENABLE_ARU=true\n").unwrap();
    artifacts.write_feature_list(SAMPLE_FEATURE_LIST).unwrap();
    harness.transport.push_response(FetchResponse::status(404));

    let outcome = harness.engine().sync().unwrap();

    assert_eq!(outcome.status, CycleStatus::NoFeatures);
    assert!(outcome.features.is_none());
    assert!(!artifacts.feature_file_path("ARU").exists());
    assert!(!artifacts.variables_path().exists());
    assert!(!artifacts.feature_list_path().exists());
    assert_eq!(harness.telemetry.counts(markers::FEATURES_NONE), 1);
    assert_eq!(harness.store.write_count(), 0);
}

#[test]
fn not_modified_after_not_found_reports_nothing_active() {
    let harness = settled();
    harness
        .artifacts()
        .write_feature_list(SAMPLE_FEATURE_LIST)
        .unwrap();
    harness.transport.push_response(FetchResponse::status(404));
    harness.engine().sync().unwrap();

    harness.transport.push_response(FetchResponse::status(304));
    let outcome = harness.engine().sync().unwrap();

    assert_eq!(outcome.status, CycleStatus::NoUpdate);
    assert!(outcome.features.is_none());
    assert!(harness.telemetry.values(markers::ACTIVE_FEATURES).is_empty());
}

#[test]
fn fresh_direct_block_skips_cycle() {
    let harness = settled();
    harness.arm_direct_block(HOUR);

    let err = harness.engine().sync().unwrap_err();

    assert!(matches!(err, SyncError::DirectBlocked { .. }));
    assert_eq!(harness.transport.fetch_count(), 0);
}

#[test]
fn expired_direct_block_is_removed() {
    let harness = settled();
    harness.arm_direct_block(25 * HOUR);
    harness.transport.push_response(FetchResponse::status(304));

    let outcome = harness.engine().sync().unwrap();

    assert_eq!(outcome.status, CycleStatus::NoUpdate);
    assert!(!harness.config.direct_block_marker.exists());
}

#[test]
fn second_cycle_is_idempotent() {
    let harness = settled();
    let engine = harness.engine();
    harness
        .transport
        .push_response(applied_response(SAMPLE_MANIFEST, "H1"));
    engine.sync().unwrap();

    harness.store.clear_writes();
    harness.transport.push_response(FetchResponse::status(304));
    let outcome = engine.sync().unwrap();

    assert_eq!(outcome.status, CycleStatus::NoUpdate);
    assert_eq!(harness.store.write_count(), 0);
    assert_eq!(engine.stats().cycles_completed, 2);
}

#[test]
fn cache_token_round_trips() {
    let harness = local_lane();
    let engine = harness.engine();
    harness
        .transport
        .push_response(applied_response(SAMPLE_MANIFEST, "H1"));
    engine.sync().unwrap();
    let stored_time = harness.store.value(keys::CONFIG_SET_TIME).unwrap();

    harness.transport.push_response(FetchResponse::status(304));
    engine.sync().unwrap();

    let requests = harness.transport.requests();
    let second = &requests[1];
    assert_eq!(second.header("configsethash"), Some("H1"));
    assert_eq!(second.header("configsettime"), Some(stored_time.as_str()));
    assert_eq!(harness.store.value(keys::XCONF_SELECTOR).as_deref(), Some("local"));
}

#[test]
fn unchanged_hash_withdraws_reboot() {
    let harness = local_lane();
    harness.write_device_properties("ENABLE_MAINTENANCE=true\n");
    let engine = harness.engine();

    let first = ManifestBuilder::new()
        .feature("Plain", Some("Plain"), &[("Device.Plain.Value", "1")])
        .build();
    harness.transport.push_response(applied_response(first, "H1"));
    let outcome = engine.sync().unwrap();
    assert!(outcome.reboot_required);

    let second = ManifestBuilder::new()
        .feature("Plain", Some("Plain"), &[("Device.Plain.Value", "2")])
        .build();
    harness.transport.push_response(applied_response(second, "h1"));
    let outcome = engine.sync().unwrap();

    assert_eq!(outcome.report.changed, vec!["Device.Plain.Value".to_string()]);
    assert!(!outcome.reboot_required);
}

#[test]
fn failed_probe_keeps_bootstrap_url_out() {
    let harness = settled();
    let body = ManifestBuilder::new()
        .feature(
            "Bootstrap",
            None,
            &[(
                "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Bootstrap.XconfUrl",
                "https://bs2.example.com",
            )],
        )
        .build();
    harness.transport.push_response(applied_response(body, "H1"));
    harness.transport.set_fallback(Ok(FetchResponse::status(500)));

    let outcome = harness.engine().sync().unwrap();

    assert_eq!(outcome.report.failed, vec![keys::BOOTSTRAP_XCONF_URL.to_string()]);
    assert!(harness.store.value(keys::BOOTSTRAP_XCONF_URL).is_none());
    let probes: Vec<_> = harness
        .transport
        .requests()
        .into_iter()
        .skip(1)
        .collect();
    assert_eq!(probes.len(), 2);
    assert!(probes
        .iter()
        .all(|p| p.url.starts_with("https://bs2.example.com/featureControl/getSettings?")));
}

#[test]
fn validated_bootstrap_url_is_stored() {
    let harness = settled();
    let body = ManifestBuilder::new()
        .feature(
            "Bootstrap",
            None,
            &[(
                "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Bootstrap.XconfUrl",
                "https://bs2.example.com",
            )],
        )
        .build();
    harness.transport.push_response(applied_response(body, "H1"));
    harness.transport.push_response(FetchResponse::status(304));

    let outcome = harness.engine().sync().unwrap();

    assert!(outcome.report.failed.is_empty());
    assert_eq!(
        harness.store.value(keys::BOOTSTRAP_XCONF_URL).as_deref(),
        Some("https://bs2.example.com")
    );
    assert_eq!(harness.transport.fetch_count(), 2);
}

#[test]
fn transport_errors_are_reported_then_retried() {
    let harness = settled();
    harness
        .transport
        .push_error(TransportError::new(TransportCode::OPERATION_TIMEDOUT, "timed out"));
    harness
        .transport
        .push_error(TransportError::new(TransportCode::COULDNT_CONNECT, "refused"));
    harness.transport.push_response(FetchResponse::status(304));

    let outcome = harness.engine().sync().unwrap();

    assert_eq!(outcome.attempts, 3);
    assert_eq!(
        harness.telemetry.values(markers::CERT_ERROR),
        vec!["RFC, 28, https://xconf.example.com".to_string()]
    );
}

#[test]
fn exhausted_cycle_fails_without_panicking() {
    let harness = settled();
    harness.transport.set_fallback(Ok(FetchResponse::status(503)));

    let err = harness.engine().sync().unwrap_err();

    match err {
        SyncError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(harness.transport.fetch_count(), 3);
    assert!(!harness.config.direct_block_marker.exists());
}

#[test]
fn unreadable_manifest_clears_cache_token() {
    let harness = settled();
    harness
        .transport
        .push_response(applied_response("{\"featureControl\":{}}", "H1"));

    let err = harness.engine().sync().unwrap_err();

    assert!(matches!(err, SyncError::Manifest(_)));
    assert_eq!(
        harness.store.value(keys::CONFIG_SET_HASH).as_deref(),
        Some(CLEARED_HASH)
    );
    assert_eq!(harness.store.value(keys::CONFIG_SET_TIME).as_deref(), Some("0"));
    assert_eq!(harness.telemetry.counts(markers::COMPLETE), 1);
}

#[test]
fn valid_account_survives_reconciliation() {
    let harness = settled();
    let body = ManifestBuilder::new()
        .feature("Plain", Some("Plain"), &[("Device.Plain.Value", "1")])
        .build();
    harness.transport.push_response(applied_response(body, "H1"));

    harness.engine().sync().unwrap();

    let writes = harness.store.writes();
    let bracket_end = writes
        .iter()
        .position(|w| w.name == keys::RELOAD_CACHE)
        .unwrap();
    let restored = writes
        .iter()
        .position(|w| w.name == keys::ACCOUNT_ID)
        .unwrap();
    assert!(restored > bracket_end);
    assert_eq!(writes[restored].value, SAMPLE_ACCOUNT_ID);
}

#[test]
fn selector_redo_uses_new_server() {
    let harness = settled();
    let redirect = ManifestBuilder::new()
        .feature(
            "Selector",
            None,
            &[
                ("tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.XconfSelector", "ci"),
                (
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.XconfUrl",
                    "https://ci.example.com/featureControl/getSettings",
                ),
            ],
        )
        .build();
    harness.transport.push_response(applied_response(redirect, "H0"));
    harness
        .transport
        .push_response(applied_response(SAMPLE_MANIFEST, "H1"));

    let engine = harness.engine();
    let mut session = engine.begin_session().unwrap();
    assert_eq!(session.state, SyncState::Init);
    let outcome = engine.run_cycle(&mut session).unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(session.state, SyncState::Finish);
    assert_eq!(session.selector_slot, Some(16));
    let requests = harness.transport.requests();
    assert!(requests[1]
        .url
        .starts_with("https://ci.example.com/featureControl/getSettings?"));
    assert_eq!(
        harness.store.value(keys::XCONF_URL).as_deref(),
        Some("https://ci.example.com/featureControl/getSettings")
    );
}

#[test]
fn local_override_reports_url() {
    let harness = local_lane();
    harness.write_override_properties("https://local.example.com/featureControl/getSettings");
    harness.transport.push_response(FetchResponse::status(304));

    harness.engine().sync().unwrap();

    assert!(harness.transport.requests()[0]
        .url
        .starts_with("https://local.example.com/"));
    assert_eq!(
        harness.telemetry.values(markers::XCONF_LOCAL_URL),
        vec!["https://local.example.com/featureControl/getSettings".to_string()]
    );
}
