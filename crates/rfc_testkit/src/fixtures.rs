//! Test fixtures and engine helpers.
//!
//! Provides the reference manifest, a harness that roots every engine
//! path under a temporary directory, and a builder for small manifests.

use filetime::FileTime;
use rfc_store::MemoryConfigStore;
use rfc_sync_engine::{
    ArtifactStore, FetchResponse, MemoryTelemetry, MockTransport, RetryConfig, SyncConfig,
    SyncEngine,
};
use rfc_sync_protocol::{BuildClass, DeviceIdentity};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Server URL written to the default properties file.
pub const DEFAULT_SERVER_URL: &str = "https://xconf.example.com/featureControl/getSettings";

/// MAC of the test device.
pub const TEST_MAC: &str = "AA:BB:CC:DD:EE:FF";

/// Firmware of the test device.
pub const TEST_FIRMWARE: &str = "SKXI11ADS_VBN_2024_sprint_20240110";

/// Account id carried by [`SAMPLE_MANIFEST`].
pub const SAMPLE_ACCOUNT_ID: &str = "4123705941507160513";

/// Enabled-feature list produced by [`SAMPLE_MANIFEST`].
pub const SAMPLE_FEATURE_LIST: &str =
    "11=true,ARU:E_29=true,AccountId=true,LSA_End2End=true,SSHWhiteList:E_N=true,Telemetry_2.0-31099=true,";

/// Number of `configData` entries in [`SAMPLE_MANIFEST`].
pub const SAMPLE_OVERRIDE_COUNT: usize = 14;

/// Six-feature reference manifest.
pub const SAMPLE_MANIFEST: &str = r#"{
    "featureControl": {
        "features": [
            {
                "name": "11",
                "enable": false,
                "effectiveImmediate": false,
                "configData": {
                    "Warrens": "Feature"
                },
                "featureInstance": "11"
            },
            {
                "name": "ARU",
                "enable": true,
                "effectiveImmediate": false,
                "configData": {
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.AutoReboot.Enable": "true",
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.AutoReboot.UpTime": "29"
                },
                "featureInstance": "ARU:E_29"
            },
            {
                "name": "AccountId",
                "enable": true,
                "effectiveImmediate": true,
                "configData": {
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.AccountInfo.AccountID": "4123705941507160513"
                },
                "featureInstance": "AccountId"
            },
            {
                "name": "LSA",
                "enable": true,
                "effectiveImmediate": true,
                "configData": {
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.LSA.AdCacheEnable": "True",
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.LSA.ByteRangeDownload": "True",
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.LSA.Enable": "True",
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.LSA.PSNUrl": "https://linear.example.net/scte/request?nw=384776&resp=scte-130",
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.LSA.PlacementReqUrl": "https://linear.example.net/scte/request?nw=384776&resp=scte-130",
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.LSA.ProgrammerEnable": "True"
                },
                "featureInstance": "LSA_End2End"
            },
            {
                "name": "SSHWhiteList",
                "enable": true,
                "effectiveImmediate": false,
                "configData": {},
                "featureInstance": "SSHWhiteList:E_N",
                "listType": "SSHWhiteList_ipList",
                "listSize": 3,
                "SSHWhiteList_ipList": ["192.0.2.10", "192.0.2.11", "192.0.2.12"]
            },
            {
                "name": "Telemetry_2.0-31099",
                "enable": true,
                "effectiveImmediate": true,
                "configData": {
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.Telemetry.Enable": "true",
                    "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.Telemetry.MTLS.Enable": "true",
                    "tr181.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.Telemetry.ConfigURL": "https://mockxconf/loguploader/getT2Settings",
                    "tr181.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.Telemetry.Version": "2.0.1"
                },
                "featureInstance": "Telemetry_2.0-31099"
            }
        ]
    }
}"#;

/// [`SAMPLE_MANIFEST`] with a seventh feature carrying the partner id `comcast`.
pub fn sample_manifest_with_partner() -> Vec<u8> {
    let mut root: Value = serde_json::from_str(SAMPLE_MANIFEST).expect("sample manifest is JSON");
    root["featureControl"]["features"]
        .as_array_mut()
        .expect("features array")
        .push(json!({
            "name": "PartnerId",
            "enable": true,
            "effectiveImmediate": true,
            "configData": {
                "tr181.Device.DeviceInfo.X_RDKCENTRAL-COM_Syndication.PartnerId": "comcast"
            },
            "featureInstance": "PartnerId"
        }));
    serde_json::to_vec(&root).expect("serialize manifest")
}

/// A 200 response carrying `body` and a `configSetHash` header.
pub fn applied_response(body: impl Into<Vec<u8>>, hash: &str) -> FetchResponse {
    FetchResponse::ok(body).with_header("configSetHash", hash)
}

/// Builds small manifests.
#[derive(Debug, Clone, Default)]
pub struct ManifestBuilder {
    features: Vec<Value>,
}

impl ManifestBuilder {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an enabled feature with the given instance and overrides.
    pub fn feature(mut self, name: &str, instance: Option<&str>, config: &[(&str, &str)]) -> Self {
        let data: Map<String, Value> = config
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
            .collect();
        let mut node = json!({
            "name": name,
            "enable": true,
            "effectiveImmediate": false,
            "configData": data,
        });
        if let Some(instance) = instance {
            node["featureInstance"] = Value::String(instance.to_string());
        }
        self.features.push(node);
        self
    }

    /// Adds a feature node as-is.
    pub fn raw(mut self, node: Value) -> Self {
        self.features.push(node);
        self
    }

    /// Serializes the manifest.
    pub fn build(&self) -> Vec<u8> {
        serde_json::to_vec(&json!({ "featureControl": { "features": self.features } }))
            .expect("serialize manifest")
    }
}

/// Engine type produced by [`TestHarness::engine`].
pub type TestEngine = SyncEngine<Arc<MockTransport>, MemoryConfigStore, Arc<MemoryTelemetry>>;

/// An engine wired to in-memory collaborators with every path under a temp dir.
///
/// Retry delays are zero and the bootstrap URL is read once, so cycles run
/// without sleeping.
pub struct TestHarness {
    /// Root of every engine path (kept alive to prevent cleanup).
    pub dir: TempDir,
    /// Engine configuration.
    pub config: SyncConfig,
    /// Device identity.
    pub identity: DeviceIdentity,
    /// Parameter store.
    pub store: Arc<MemoryConfigStore>,
    /// Scripted transport.
    pub transport: Arc<MockTransport>,
    /// Recorded telemetry.
    pub telemetry: Arc<MemoryTelemetry>,
}

impl TestHarness {
    /// Creates a production-build harness pointing at [`DEFAULT_SERVER_URL`].
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config = SyncConfig::rooted(dir.path())
            .with_retry(RetryConfig::new(3).with_delay(Duration::ZERO))
            .with_bootstrap_read(1, Duration::ZERO);
        let identity = DeviceIdentity::new(TEST_MAC, TEST_FIRMWARE)
            .with_build_class(BuildClass::Prod)
            .with_model("SKXI11ADS")
            .with_manufacturer("Sky")
            .with_partner_id("comcast");

        let harness = Self {
            dir,
            config,
            identity,
            store: Arc::new(MemoryConfigStore::new()),
            transport: Arc::new(MockTransport::new()),
            telemetry: Arc::new(MemoryTelemetry::new()),
        };
        harness.write_rfc_properties(DEFAULT_SERVER_URL);
        harness
    }

    /// Replaces the store.
    pub fn with_store(mut self, store: MemoryConfigStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    /// Replaces the identity.
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Adjusts the configuration.
    pub fn with_config(mut self, f: impl FnOnce(SyncConfig) -> SyncConfig) -> Self {
        self.config = f(self.config);
        self
    }

    /// Builds an engine sharing this harness's collaborators.
    pub fn engine(&self) -> TestEngine {
        SyncEngine::new(
            self.config.clone(),
            self.identity.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            Arc::clone(&self.telemetry),
        )
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Artifact directory.
    pub fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(&self.config.artifact_dir)
    }

    /// Writes the default properties file.
    pub fn write_rfc_properties(&self, server_url: &str) {
        write_file(
            &self.config.rfc_properties,
            &format!("RFC_CONFIG_SERVER_URL={server_url}\n"),
        );
    }

    /// Writes the local override properties file.
    pub fn write_override_properties(&self, server_url: &str) {
        write_file(
            &self.config.rfc_properties_override,
            &format!("RFC_CONFIG_SERVER_URL={server_url}\n"),
        );
    }

    /// Writes the device properties file.
    pub fn write_device_properties(&self, contents: &str) {
        write_file(&self.config.device_properties, contents);
    }

    /// Records the current firmware as already processed.
    pub fn mark_firmware_processed(&self) {
        self.artifacts()
            .write_version(&self.identity.firmware_version)
            .expect("Failed to write version marker");
    }

    /// Creates the direct-block marker dated `age` ago.
    pub fn arm_direct_block(&self, age: Duration) {
        let path = &self.config.direct_block_marker;
        write_file(path, "");
        let mtime = SystemTime::now() - age;
        filetime::set_file_mtime(path, FileTime::from_system_time(mtime))
            .expect("Failed to set marker mtime");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create directory");
    }
    fs::write(path, contents).expect("Failed to write file");
}
