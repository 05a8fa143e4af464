//! Conditional-fetch cache token and header codec.

/// Request header carrying the last applied hash.
pub const CONFIG_SET_HASH_HEADER: &str = "configsethash";
/// Request header carrying the last applied time.
pub const CONFIG_SET_TIME_HEADER: &str = "configsettime";

/// Hash sent to force the server to return a full manifest.
pub const OVERRIDE_HASH: &str = "OVERRIDE_HASH";
/// Hash sent after a firmware change or when no hash is stored.
pub const UPGRADE_HASH: &str = "UPGRADE_HASH";
/// Hash persisted after a failed reconciliation.
pub const CLEARED_HASH: &str = "CLEARED";
/// Time sent when no applied time is known.
pub const ZERO_TIME: &str = "0";

/// The (hash, time) pair identifying the last applied manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheToken {
    /// Opaque manifest hash.
    pub hash: String,
    /// Epoch seconds, as a decimal string.
    pub time: String,
}

impl CacheToken {
    /// Creates a token.
    pub fn new(hash: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            time: time.into(),
        }
    }

    /// Token forcing a full response.
    pub fn override_token() -> Self {
        Self::new(OVERRIDE_HASH, ZERO_TIME)
    }

    /// Token sent after a firmware upgrade.
    pub fn upgrade() -> Self {
        Self::new(UPGRADE_HASH, ZERO_TIME)
    }

    /// Token persisted after a failed reconciliation.
    pub fn cleared() -> Self {
        Self::new(CLEARED_HASH, ZERO_TIME)
    }

    /// Conditional request headers for this token.
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            (CONFIG_SET_HASH_HEADER.to_string(), self.hash.clone()),
            (CONFIG_SET_TIME_HEADER.to_string(), self.time.clone()),
        ]
    }
}

/// Finds the `configSetHash` response header (any case), trimmed.
///
/// Returns `None` if the header is absent or blank.
pub fn extract_config_set_hash(headers: &[(String, String)]) -> Option<String> {
    headers
        .iter()
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(CONFIG_SET_HASH_HEADER))
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}
