//! Device identity snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder for an identity value that is not known yet.
pub const UNKNOWN: &str = "Unknown";

/// Returns true if `value` is the [`UNKNOWN`] placeholder (any case).
pub fn is_unknown(value: &str) -> bool {
    value.eq_ignore_ascii_case(UNKNOWN)
}

/// Returns true if `value` is a usable account or partner identifier.
///
/// Identifiers must be non-empty and purely ASCII alphanumeric; any other
/// character rejects the whole value.
pub fn is_valid_identity(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Build flavour of the running firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildClass {
    /// Not determined.
    #[default]
    Unknown,
    /// Developer build.
    Dev,
    /// Internal validation build.
    Vbn,
    /// Production build.
    Prod,
    /// QA build.
    Qa,
}

impl BuildClass {
    /// Returns true for production builds.
    pub fn is_prod(self) -> bool {
        self == BuildClass::Prod
    }

    /// Value sent as the `env` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            BuildClass::Unknown => "",
            BuildClass::Dev => "dev",
            BuildClass::Vbn => "vbn",
            BuildClass::Prod => "prod",
            BuildClass::Qa => "qa",
        }
    }
}

impl FromStr for BuildClass {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "dev" => BuildClass::Dev,
            "vbn" => BuildClass::Vbn,
            "prod" => BuildClass::Prod,
            "qa" => BuildClass::Qa,
            _ => BuildClass::Unknown,
        })
    }
}

impl fmt::Display for BuildClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only facts about the device, captured once per process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// eSTB MAC address.
    pub mac: String,
    /// Running firmware image name.
    pub firmware_version: String,
    /// Build flavour.
    pub build_class: BuildClass,
    /// Model number.
    pub model: String,
    /// Manufacturer.
    pub manufacturer: String,
    /// Partner identifier reported by the device.
    pub partner_id: String,
}

impl DeviceIdentity {
    /// Creates an identity with the given MAC and firmware.
    pub fn new(mac: impl Into<String>, firmware_version: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            firmware_version: firmware_version.into(),
            ..Self::default()
        }
    }

    /// Sets the build class.
    #[must_use]
    pub fn with_build_class(mut self, build_class: BuildClass) -> Self {
        self.build_class = build_class;
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the manufacturer.
    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    /// Sets the partner id.
    #[must_use]
    pub fn with_partner_id(mut self, partner_id: impl Into<String>) -> Self {
        self.partner_id = partner_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_class_parse() {
        assert_eq!("PROD".parse::<BuildClass>().unwrap(), BuildClass::Prod);
        assert_eq!("dev\n".parse::<BuildClass>().unwrap(), BuildClass::Dev);
        assert_eq!("vbn".parse::<BuildClass>().unwrap(), BuildClass::Vbn);
        assert_eq!("qa".parse::<BuildClass>().unwrap(), BuildClass::Qa);
        assert_eq!("whatever".parse::<BuildClass>().unwrap(), BuildClass::Unknown);
        assert!(BuildClass::Prod.is_prod());
        assert!(!BuildClass::Dev.is_prod());
    }

    #[test]
    fn identity_validation() {
        assert!(is_valid_identity("4123705941507160513"));
        assert!(is_valid_identity("comcast"));
        assert!(is_valid_identity(UNKNOWN));
        assert!(!is_valid_identity(""));
        assert!(!is_valid_identity("abc-123"));
        assert!(!is_valid_identity("abc 123"));
        assert!(!is_valid_identity("sky;rm"));
    }

    #[test]
    fn unknown_is_case_insensitive() {
        assert!(is_unknown("Unknown"));
        assert!(is_unknown("UNKNOWN"));
        assert!(!is_unknown("Unkown"));
    }

    #[test]
    fn identity_builder() {
        let id = DeviceIdentity::new("01:23:45:67:89:ab", "TestImage")
            .with_build_class(BuildClass::Vbn)
            .with_model("SKXI11ADS")
            .with_manufacturer("Sky")
            .with_partner_id("sky-uk");
        assert_eq!(id.mac, "01:23:45:67:89:ab");
        assert_eq!(id.build_class, BuildClass::Vbn);
        assert_eq!(id.partner_id, "sky-uk");
    }
}
