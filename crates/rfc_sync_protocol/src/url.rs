//! `getSettings` request URL construction.

use std::fmt::Write;

/// Path appended to a bootstrap base URL.
pub const SETTINGS_PATH: &str = "/featureControl/getSettings";

const CONTROLLER_ID: u32 = 2504;
const CHANNEL_MAP_ID: u32 = 2345;
const VOD_ID: u32 = 15660;
const QUERY_VERSION: u32 = 2;

/// Strips [`SETTINGS_PATH`] from a server URL, leaving the host part.
pub fn base_host(server_url: &str) -> &str {
    match server_url.find(SETTINGS_PATH) {
        Some(idx) => &server_url[..idx],
        None => server_url,
    }
}

/// Identity values carried in the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlFields {
    /// eSTB MAC address.
    pub mac: String,
    /// Firmware version.
    pub firmware_version: String,
    /// Build environment.
    pub env: String,
    /// Model number.
    pub model: String,
    /// Manufacturer.
    pub manufacturer: String,
    /// Partner id.
    pub partner_id: String,
    /// OS class.
    pub os_class: String,
    /// Account id.
    pub account_id: String,
    /// Experience.
    pub experience: String,
}

/// Builds the manifest request URL.
///
/// Value-bearing fields are percent-encoded unless encoding is turned
/// off. The fixed numeric ids are never encoded. Empty fields still emit
/// `key=`.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    encode: bool,
}

impl Default for UrlBuilder {
    fn default() -> Self {
        Self { encode: true }
    }
}

impl UrlBuilder {
    /// Creates a builder that percent-encodes values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns percent-encoding on or off.
    #[must_use]
    pub fn with_encoding(mut self, encode: bool) -> Self {
        self.encode = encode;
        self
    }

    /// Returns true if values are percent-encoded.
    pub fn encodes(&self) -> bool {
        self.encode
    }

    fn value(&self, raw: &str) -> String {
        if self.encode {
            urlencoding::encode(raw).into_owned()
        } else {
            raw.to_string()
        }
    }

    /// Composes `<server_url>?<query>`.
    pub fn build(&self, server_url: &str, fields: &UrlFields) -> String {
        let mut url = String::with_capacity(server_url.len() + 256);
        url.push_str(server_url);
        url.push('?');

        // Writing into a String cannot fail.
        let _ = write!(
            url,
            "estbMacAddress={}&firmwareVersion={}&env={}&model={}&manufacturer={}\
             &controllerId={CONTROLLER_ID}&channelMapId={CHANNEL_MAP_ID}&VodId={VOD_ID}\
             &partnerId={}&osClass={}&accountId={}&Experience={}&version={QUERY_VERSION}",
            self.value(&fields.mac),
            self.value(&fields.firmware_version),
            self.value(&fields.env),
            self.value(&fields.model),
            self.value(&fields.manufacturer),
            self.value(&fields.partner_id),
            self.value(&fields.os_class),
            self.value(&fields.account_id),
            self.value(&fields.experience),
        );
        url
    }
}
