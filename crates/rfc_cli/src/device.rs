//! Device identity readers.

use crate::settings::DeviceSources;
use rfc_sync_engine::read_properties;
use rfc_sync_protocol::{BuildClass, DeviceIdentity};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const IMAGE_NAME_PREFIX: &str = "imagename:";

/// Reads the device identity from its scattered sources.
///
/// A missing source leaves the field empty; the manifest request still
/// goes out.
pub fn read_identity(sources: &DeviceSources, device_properties: &Path) -> DeviceIdentity {
    let props = read_properties(device_properties).unwrap_or_else(|e| {
        warn!(path = %device_properties.display(), error = %e, "device properties unreadable");
        Vec::new()
    });
    let prop = |key: &str| {
        props
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    };

    let build_class = prop("BUILD_TYPE")
        .parse::<BuildClass>()
        .unwrap_or_default();

    let identity = DeviceIdentity::new(
        first_line(&sources.mac_file),
        firmware_version(&sources.version_file),
    )
    .with_build_class(build_class)
    .with_model(prop("MODEL_NUM"))
    .with_manufacturer(first_line(&sources.manufacturer_file))
    .with_partner_id(first_line(&sources.partner_file));

    debug!(
        mac = %identity.mac,
        firmware = %identity.firmware_version,
        build = %identity.build_class,
        model = %identity.model,
        "device identity read"
    );
    identity
}

/// Firmware version from the `imagename:` line of the version file.
pub fn firmware_version(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .find_map(|line| line.strip_prefix(IMAGE_NAME_PREFIX))
            .map(|v| v.trim().to_string())
            .unwrap_or_default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "version file unreadable");
            String::new()
        }
    }
}

fn first_line(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(contents) => contents.lines().next().unwrap_or("").trim().to_string(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "identity source unreadable");
            String::new()
        }
    }
}
