//! Conditional-fetch cache tracking.

use crate::error::SyncResult;
use crate::state::{SyncSession, SyncState};
use rfc_store::ConfigStore;
use rfc_sync_protocol::{
    extract_config_set_hash, keys, CacheToken, CLEARED_HASH, OVERRIDE_HASH, UPGRADE_HASH,
    ZERO_TIME,
};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Selects the token sent with a request and persists the one returned.
pub struct CacheTracker<'a, S: ConfigStore + ?Sized> {
    store: &'a S,
    sync_done: PathBuf,
}

impl<'a, S: ConfigStore + ?Sized> CacheTracker<'a, S> {
    /// Creates a tracker over `store`; `sync_done` is touched after every applied manifest.
    pub fn new(store: &'a S, sync_done: impl Into<PathBuf>) -> Self {
        Self {
            store,
            sync_done: sync_done.into(),
        }
    }

    /// Chooses the token for the next request.
    ///
    /// - Firmware changed since the last applied manifest, or none was
    ///   ever applied → upgrade token
    /// - First pass of a production-lane cycle → override token
    /// - Otherwise the persisted token, remembered in `session.backup_hash`
    ///
    /// An unknown account or partner always forces the override hash.
    pub fn request_token(&self, session: &mut SyncSession, firmware_version: &str) -> CacheToken {
        let upgraded = session.last_firmware.as_deref() != Some(firmware_version);

        let mut token = if upgraded {
            info!(
                last = session.last_firmware.as_deref().unwrap_or(""),
                current = firmware_version,
                "firmware changed, requesting full manifest"
            );
            CacheToken::upgrade()
        } else if session.state == SyncState::Init && self.selector_is_prod() {
            CacheToken::override_token()
        } else {
            let stored = self.stored();
            session.backup_hash = Some(stored.hash.clone());
            stored
        };

        if session.context.has_unknown_identity() {
            token = CacheToken::new(OVERRIDE_HASH, token.time);
        }
        debug!(hash = %token.hash, time = %token.time, "cache token selected");
        token
    }

    /// Returns the persisted token, defaulting a missing hash to the upgrade hash.
    pub fn stored(&self) -> CacheToken {
        let hash = self
            .read(keys::CONFIG_SET_HASH)
            .unwrap_or_else(|| UPGRADE_HASH.to_string());
        let time = self
            .read(keys::CONFIG_SET_TIME)
            .unwrap_or_else(|| ZERO_TIME.to_string());
        CacheToken::new(hash, time)
    }

    /// Persists the token of an applied manifest.
    ///
    /// A manifest carrying the hash the device already had cancels any
    /// pending reboot request.
    pub fn record_success(
        &self,
        headers: &[(String, String)],
        session: &mut SyncSession,
    ) -> SyncResult<()> {
        match extract_config_set_hash(headers) {
            Some(hash) => {
                self.store
                    .set(keys::OWNER_CONFIG_SET_HASH, keys::CONFIG_SET_HASH, &hash)?;
                let unchanged = session
                    .backup_hash
                    .as_deref()
                    .is_some_and(|prior| prior.eq_ignore_ascii_case(&hash));
                if unchanged && session.reboot_required {
                    info!("manifest hash unchanged, reboot not required");
                    session.reboot_required = false;
                }
            }
            None => warn!("response carried no configSetHash header"),
        }

        let now = epoch_seconds().to_string();
        self.store
            .set(keys::OWNER_CONFIG_SET_TIME, keys::CONFIG_SET_TIME, &now)?;
        if let Err(e) = touch(&self.sync_done) {
            warn!(path = %self.sync_done.display(), error = %e, "failed to touch sync marker");
        }
        Ok(())
    }

    /// Persists the cleared token after a failed reconciliation.
    pub fn record_failure(&self) -> SyncResult<()> {
        self.store
            .set(keys::OWNER_CONFIG_SET_HASH, keys::CONFIG_SET_HASH, CLEARED_HASH)?;
        self.store
            .set(keys::OWNER_CONFIG_SET_TIME, keys::CONFIG_SET_TIME, ZERO_TIME)?;
        Ok(())
    }

    fn selector_is_prod(&self) -> bool {
        self.read(keys::XCONF_SELECTOR).as_deref() == Some("prod")
    }

    fn read(&self, name: &str) -> Option<String> {
        match self.store.get_value(name) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(name, error = %e, "cache parameter unreadable");
                None
            }
        }
    }
}

pub(crate) fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn touch(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}
