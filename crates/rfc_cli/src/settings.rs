//! `rfcmgr` settings file.
//!
//! Every field is optional; anything left out keeps the on-device default.
//!
//! ```toml
//! artifact_dir = "/opt/secure/RFC"
//! block_on_exhaustion = true
//!
//! [retry]
//! attempts = 3
//! delay_secs = 10
//!
//! [credentials]
//! certificates = ["/opt/certs/devicecert_1.pk12", "/etc/ssl/certs/staticXpkiCrt.pk12"]
//! passphrase_command = "/usr/bin/rdkssacli '{STOR=GET,SRC=kquhqtoczcbx,DST=/dev/stdout}'"
//! ```

use rfc_sync_engine::{RetryConfig, SyncConfig};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Settings file errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Settings path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The file is not valid TOML for these settings.
    #[error("invalid settings in {path}: {source}")]
    Parse {
        /// Settings path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Feature artifact directory.
    pub artifact_dir: Option<PathBuf>,
    /// Default properties file.
    pub rfc_properties: Option<PathBuf>,
    /// Local override properties file.
    pub rfc_properties_override: Option<PathBuf>,
    /// Device properties file.
    pub device_properties: Option<PathBuf>,
    /// Direct-block marker.
    pub direct_block_marker: Option<PathBuf>,
    /// Direct-block window in seconds.
    pub direct_block_window_secs: Option<u64>,
    /// Marker touched after every applied manifest.
    pub sync_done_marker: Option<PathBuf>,
    /// Percent-encode query values.
    pub encode_url: Option<bool>,
    /// Arm the direct-block marker after an exhausted cycle.
    pub block_on_exhaustion: Option<bool>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Bootstrap URL probe attempts.
    pub probe_attempts: Option<u32>,
    /// Retry policy.
    pub retry: RetrySettings,
    /// Bootstrap URL read policy.
    pub bootstrap: BootstrapSettings,
    /// Parameter store files.
    pub store: StoreSettings,
    /// Identity sources.
    pub device: DeviceSources,
    /// Client certificates.
    pub credentials: CredentialSettings,
    /// Telemetry client.
    pub telemetry: TelemetrySettings,
    /// Experience service.
    pub experience: ExperienceSettings,
}

/// `[retry]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    /// Fetch attempts per cycle.
    pub attempts: Option<u32>,
    /// Delay between attempts in seconds.
    pub delay_secs: Option<u64>,
}

/// `[bootstrap]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapSettings {
    /// Reads of the bootstrap URL.
    pub read_attempts: Option<u32>,
    /// Delay between reads in seconds.
    pub read_delay_secs: Option<u64>,
}

/// `[store]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Persisted parameter file.
    pub path: PathBuf,
    /// Read-only defaults file.
    pub defaults: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/opt/secure/RFC/tr181store.ini"),
            defaults: Some(PathBuf::from("/etc/rfcdefaults.ini")),
        }
    }
}

/// `[device]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceSources {
    /// File holding the STB MAC.
    pub mac_file: PathBuf,
    /// Version file with an `imagename:` line.
    pub version_file: PathBuf,
    /// File holding the manufacturer name.
    pub manufacturer_file: PathBuf,
    /// File holding the partner id.
    pub partner_file: PathBuf,
}

impl Default for DeviceSources {
    fn default() -> Self {
        Self {
            mac_file: PathBuf::from("/tmp/.estb_mac"),
            version_file: PathBuf::from("/version.txt"),
            manufacturer_file: PathBuf::from("/tmp/.manufacturer"),
            partner_file: PathBuf::from("/opt/partnerid"),
        }
    }
}

/// `[credentials]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialSettings {
    /// Use mutual TLS at all.
    pub enabled: bool,
    /// PKCS#12 files tried in order.
    pub certificates: Vec<PathBuf>,
    /// Shell command printing the passphrase.
    pub passphrase_command: Option<String>,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            certificates: vec![
                PathBuf::from("/opt/certs/devicecert_1.pk12"),
                PathBuf::from("/etc/ssl/certs/staticXpkiCrt.pk12"),
            ],
            passphrase_command: None,
        }
    }
}

/// `[telemetry]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    /// Telemetry 2.0 client binary; events are only logged if it is absent.
    pub client: PathBuf,
    /// Process signalled when the telemetry profile URL changes.
    pub daemon: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            client: PathBuf::from("/usr/bin/telemetry2_0_client"),
            daemon: "telemetry2_0".to_string(),
        }
    }
}

/// `[experience]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperienceSettings {
    /// JSON-RPC endpoint of the auth service.
    pub endpoint: String,
    /// Experience used when the service does not answer.
    pub fallback: String,
}

impl Default for ExperienceSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9998/jsonrpc".to_string(),
            fallback: "X1".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses settings from TOML text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Engine configuration with these settings applied over the defaults.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::new();
        let paths = [
            (&mut config.artifact_dir, &self.artifact_dir),
            (&mut config.rfc_properties, &self.rfc_properties),
            (&mut config.rfc_properties_override, &self.rfc_properties_override),
            (&mut config.device_properties, &self.device_properties),
            (&mut config.direct_block_marker, &self.direct_block_marker),
            (&mut config.sync_done_marker, &self.sync_done_marker),
        ];
        for (slot, value) in paths {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }

        if let Some(secs) = self.direct_block_window_secs {
            config = config.with_direct_block_window(Duration::from_secs(secs));
        }
        if let Some(encode) = self.encode_url {
            config = config.with_url_encoding(encode);
        }
        if let Some(block) = self.block_on_exhaustion {
            config = config.with_block_on_exhaustion(block);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = self.probe_attempts {
            config = config.with_probe_attempts(attempts);
        }

        let mut retry = config.retry.clone();
        if let Some(attempts) = self.retry.attempts {
            retry = RetryConfig::new(attempts).with_delay(retry.delay);
        }
        if let Some(secs) = self.retry.delay_secs {
            retry = retry.with_delay(Duration::from_secs(secs));
        }
        config = config.with_retry(retry);

        let attempts = self
            .bootstrap
            .read_attempts
            .unwrap_or(config.bootstrap_read_attempts);
        let delay = self
            .bootstrap
            .read_delay_secs
            .map(Duration::from_secs)
            .unwrap_or(config.bootstrap_read_delay);
        config.with_bootstrap_read(attempts, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_keep_defaults() {
        let settings = Settings::parse("").unwrap();
        let config = settings.sync_config();
        let defaults = SyncConfig::new();
        assert_eq!(config.artifact_dir, defaults.artifact_dir);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.probe_attempts, 2);
        assert!(settings.credentials.enabled);
        assert_eq!(settings.experience.fallback, "X1");
    }

    #[test]
    fn overrides_apply() {
        let settings = Settings::parse(
            r#"
            artifact_dir = "/tmp/rfc"
            block_on_exhaustion = true
            timeout_secs = 5

            [retry]
            attempts = 5
            delay_secs = 1

            [bootstrap]
            read_attempts = 2

            [credentials]
            enabled = false
            "#,
        )
        .unwrap();
        let config = settings.sync_config();
        assert_eq!(config.artifact_dir, PathBuf::from("/tmp/rfc"));
        assert!(config.block_on_exhaustion);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_secs(1));
        assert_eq!(config.bootstrap_read_attempts, 2);
        assert!(!settings.credentials.enabled);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(Settings::parse("retries = 3").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/rfcmgr.toml"))).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
