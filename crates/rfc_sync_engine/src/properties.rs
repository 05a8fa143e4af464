//! `KEY=value` property files.

use std::fs;
use std::io;
use std::path::Path;

const SERVER_URL_KEY: &str = "RFC_CONFIG_SERVER_URL";

/// Reads `KEY=value` pairs, skipping blank lines and `#` comments.
///
/// Values keep everything after the first `=`, trimmed.
pub fn read_properties(path: &Path) -> io::Result<Vec<(String, String)>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect())
}

/// Reads `RFC_CONFIG_SERVER_URL` from a properties file.
///
/// Returns `None` if the file is missing or the value is empty.
pub fn server_url_from(path: &Path) -> Option<String> {
    read_properties(path)
        .ok()?
        .into_iter()
        .find(|(k, _)| k == SERVER_URL_KEY)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

/// Switches read from the device properties file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Partner and OS class come from the identity service.
    pub whoami_support: bool,
    /// Applied changes are deferred to the maintenance window.
    pub maintenance_enabled: bool,
    /// `BUILD_TYPE`, if present.
    pub build_type: Option<String>,
    /// `MODEL_NUM`, if present.
    pub model: Option<String>,
}

impl DeviceProperties {
    /// Loads device properties. A missing file yields the defaults.
    pub fn load(path: &Path) -> io::Result<Self> {
        let pairs = match read_properties(path) {
            Ok(pairs) => pairs,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e),
        };

        let mut props = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "WHOAMI_SUPPORT" => props.whoami_support = value == "true",
                "ENABLE_MAINTENANCE" => props.maintenance_enabled = value == "true",
                "BUILD_TYPE" if !value.is_empty() => props.build_type = Some(value),
                "MODEL_NUM" if !value.is_empty() => props.model = Some(value),
                _ => {}
            }
        }
        Ok(props)
    }
}
