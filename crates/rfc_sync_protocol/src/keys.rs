//! Parameter names in the device's TR-181 namespace.

/// Substring marking keys owned by the feature-control namespace.
pub const MANAGED_NAMESPACE: &str = ".X_RDKCENTRAL-COM_RFC.";

/// Prefix stripped from `configData` keys.
pub const TR181_PREFIX: &str = "tr181.";

/// Selector lane persisted after a completed pass (`prod`, `local`, `ci`, ...).
pub const XCONF_SELECTOR: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.XconfSelector";
/// Working server URL persisted after a completed pass.
pub const XCONF_URL: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.XconfUrl";
/// Bootstrap server base URL.
pub const BOOTSTRAP_XCONF_URL: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Bootstrap.XconfUrl";

/// Account identifier.
pub const ACCOUNT_ID: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.AccountInfo.AccountID";
/// Partner identifier.
pub const PARTNER_ID: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_Syndication.PartnerId";
/// Partner name provided by the identity service.
pub const PARTNER_NAME: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Bootstrap.PartnerName";
/// OS class provided by the identity service.
pub const OS_CLASS: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Bootstrap.OsClass";

/// Last applied manifest hash.
pub const CONFIG_SET_HASH: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.ConfigSetHash";
/// Epoch seconds of the last applied manifest.
pub const CONFIG_SET_TIME: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.ConfigSetTime";

/// Telemetry profile URL.
pub const TELEMETRY_CONFIG_URL: &str =
    "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Feature.Telemetry.ConfigURL";
/// Debug services switch.
pub const DEBUG_SERVICES: &str =
    "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Identity.DbgServices.Enable";

/// Clear bracket: begin marker.
pub const CLEAR_DB: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.ClearDB";
/// Clear bracket: bootstrap begin marker.
pub const BOOTSTRAP_CLEAR_DB: &str =
    "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Bootstrap.Control.ClearDB";
/// Clear bracket: change timestamp (epoch seconds).
pub const CONFIG_CHANGE_TIME: &str =
    "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.ConfigChangeTime";
/// Clear bracket: end marker.
pub const CLEAR_DB_END: &str = "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Control.ClearDBEnd";
/// Clear bracket: bootstrap end marker.
pub const BOOTSTRAP_CLEAR_DB_END: &str =
    "Device.DeviceInfo.X_RDKCENTRAL-COM_RFC.Bootstrap.Control.ClearDBEnd";
/// Clear bracket: cache reload request.
pub const RELOAD_CACHE: &str = "RFC_CONTROL_RELOADCACHE";

/// Owner name for ordinary writes.
pub const OWNER_RFC: &str = "rfc";
/// Owner name for the cache token hash.
pub const OWNER_CONFIG_SET_HASH: &str = "ConfigSetHash";
/// Owner name for the cache token time.
pub const OWNER_CONFIG_SET_TIME: &str = "ConfigSetTime";

/// Returns true if `key` lies in the feature-control namespace.
pub fn is_managed(key: &str) -> bool {
    key.contains(MANAGED_NAMESPACE)
}

/// Returns true if `key` names the account identifier.
pub fn is_account_key(key: &str) -> bool {
    key.contains(ACCOUNT_ID)
}
