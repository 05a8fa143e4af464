//! Configuration for the sync engine.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one agent installation.
///
/// Defaults point at the on-device locations; [`SyncConfig::rooted`]
/// relocates every path under one directory for tests and tooling.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory holding feature artifacts (`rfcFeature.list`, `.RFC_*.ini`, ...).
    pub artifact_dir: PathBuf,
    /// Default properties file carrying `RFC_CONFIG_SERVER_URL=`.
    pub rfc_properties: PathBuf,
    /// Local override of the properties file.
    pub rfc_properties_override: PathBuf,
    /// Device properties (`WHOAMI_SUPPORT`, `ENABLE_MAINTENANCE`, ...).
    pub device_properties: PathBuf,
    /// Marker whose recent mtime blocks the direct path.
    pub direct_block_marker: PathBuf,
    /// How long a direct-block marker stays effective.
    pub direct_block_window: Duration,
    /// Marker touched after every applied manifest.
    pub sync_done_marker: PathBuf,
    /// Fetch retry policy.
    pub retry: RetryConfig,
    /// Attempts to validate a new bootstrap URL before persisting it.
    pub probe_attempts: u32,
    /// Reads of the bootstrap URL while the store warms up.
    pub bootstrap_read_attempts: u32,
    /// Delay between bootstrap URL reads.
    pub bootstrap_read_delay: Duration,
    /// Percent-encode query values.
    pub encode_url: bool,
    /// Arm the direct-block marker when every attempt of a cycle fails.
    pub block_on_exhaustion: bool,
    /// Request timeout handed to the HTTP client.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Creates the on-device configuration.
    pub fn new() -> Self {
        Self {
            artifact_dir: PathBuf::from("/opt/secure/RFC"),
            rfc_properties: PathBuf::from("/etc/rfc.properties"),
            rfc_properties_override: PathBuf::from("/opt/rfc.properties"),
            device_properties: PathBuf::from("/etc/device.properties"),
            direct_block_marker: PathBuf::from("/tmp/.lastdirectfail_rfc"),
            direct_block_window: Duration::from_secs(24 * 60 * 60),
            sync_done_marker: PathBuf::from("/tmp/.rfcSyncDone"),
            retry: RetryConfig::default(),
            probe_attempts: 2,
            bootstrap_read_attempts: 10,
            bootstrap_read_delay: Duration::from_secs(10),
            encode_url: true,
            block_on_exhaustion: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Creates a configuration with every path under `root`.
    ///
    /// Layout: `root/RFC/` for artifacts, `root/etc/` for property files,
    /// `root/opt/` for the override, `root/tmp/` for markers.
    pub fn rooted(root: &Path) -> Self {
        Self {
            artifact_dir: root.join("RFC"),
            rfc_properties: root.join("etc").join("rfc.properties"),
            rfc_properties_override: root.join("opt").join("rfc.properties"),
            device_properties: root.join("etc").join("device.properties"),
            direct_block_marker: root.join("tmp").join(".lastdirectfail_rfc"),
            sync_done_marker: root.join("tmp").join(".rfcSyncDone"),
            ..Self::new()
        }
    }

    /// Sets the artifact directory.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the bootstrap URL read policy.
    pub fn with_bootstrap_read(mut self, attempts: u32, delay: Duration) -> Self {
        self.bootstrap_read_attempts = attempts.max(1);
        self.bootstrap_read_delay = delay;
        self
    }

    /// Sets the number of probe attempts for a new bootstrap URL.
    pub fn with_probe_attempts(mut self, attempts: u32) -> Self {
        self.probe_attempts = attempts.max(1);
        self
    }

    /// Turns query value encoding on or off.
    pub fn with_url_encoding(mut self, encode: bool) -> Self {
        self.encode_url = encode;
        self
    }

    /// Arms the direct-block marker after an exhausted cycle.
    pub fn with_block_on_exhaustion(mut self, block: bool) -> Self {
        self.block_on_exhaustion = block;
        self
    }

    /// Sets the direct-block window.
    pub fn with_direct_block_window(mut self, window: Duration) -> Self {
        self.direct_block_window = window;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
///
/// Attempts are spaced by a fixed delay; the manifest service is polled
/// by an external scheduler, so there is no backoff growth within a cycle.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of fetch rounds per cycle.
    pub max_attempts: u32,
    /// Delay between rounds.
    pub delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration with the default 10s delay.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::from_secs(10),
        }
    }

    /// Creates a configuration with a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Sets the delay between rounds.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay before `attempt` (0-indexed). The first attempt is immediate.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.delay
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
