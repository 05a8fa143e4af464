//! Status command implementation.

use crate::commands::open_store;
use crate::settings::Settings;
use rfc_store::ConfigStore;
use rfc_sync_engine::{ArtifactStore, BlockStatus, CacheTracker, DirectBlock, SyncConfig};
use rfc_sync_protocol::keys;
use serde::Serialize;

/// Persisted sync state.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Stored manifest hash.
    pub config_set_hash: String,
    /// Stored manifest time.
    pub config_set_time: String,
    /// Selector lane of the last completed pass.
    pub selector: Option<String>,
    /// Server URL of the last completed pass.
    pub xconf_url: Option<String>,
    /// Bootstrap server URL.
    pub bootstrap_url: Option<String>,
    /// Stored account id.
    pub account_id: Option<String>,
    /// Firmware of the last applied manifest.
    pub last_firmware: Option<String>,
    /// Enabled-feature list.
    pub features: Option<String>,
    /// Seconds until the direct path unblocks, if blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_block_remaining_secs: Option<u64>,
}

impl StatusReport {
    /// Collects the report from `store` and the artifact directory.
    pub fn collect<S: ConfigStore + ?Sized>(store: &S, config: &SyncConfig) -> Self {
        let token = CacheTracker::new(store, &config.sync_done_marker).stored();
        let artifacts = ArtifactStore::new(&config.artifact_dir);
        let read = |name: &str| store.get_value(name).ok().flatten().filter(|v| !v.is_empty());
        let block = DirectBlock::new(&config.direct_block_marker, config.direct_block_window);
        let direct_block_remaining_secs = match block.check() {
            Ok(BlockStatus::Blocked { remaining }) => Some(remaining.as_secs()),
            _ => None,
        };

        Self {
            config_set_hash: token.hash,
            config_set_time: token.time,
            selector: read(keys::XCONF_SELECTOR),
            xconf_url: read(keys::XCONF_URL),
            bootstrap_url: read(keys::BOOTSTRAP_XCONF_URL),
            account_id: read(keys::ACCOUNT_ID),
            last_firmware: artifacts.last_firmware(),
            features: artifacts.feature_list_head(),
            direct_block_remaining_secs,
        }
    }
}

/// Runs the status command.
pub fn run(settings: &Settings, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings.sync_config();
    let store = open_store(settings)?;
    let report = StatusReport::collect(&store, &config);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_text(&report),
        other => return Err(format!("unknown format: {other}").into()),
    }
    Ok(())
}

fn print_text(report: &StatusReport) {
    let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    println!("RFC sync status");
    println!("===============");
    println!("Config set hash: {}", report.config_set_hash);
    println!("Config set time: {}", report.config_set_time);
    println!("Selector:        {}", show(&report.selector));
    println!("Xconf URL:       {}", show(&report.xconf_url));
    println!("Bootstrap URL:   {}", show(&report.bootstrap_url));
    println!("Account ID:      {}", show(&report.account_id));
    println!("Last firmware:   {}", show(&report.last_firmware));
    println!("Features:        {}", show(&report.features));
    match report.direct_block_remaining_secs {
        Some(secs) => println!("Direct path:     blocked ({secs}s remaining)"),
        None => println!("Direct path:     open"),
    }
}
