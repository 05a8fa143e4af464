//! CLI command implementations.

pub mod status;
pub mod sync;

use crate::settings::Settings;
use rfc_store::{IniConfigStore, StoreResult};

/// Opens the parameter store named by `settings`.
pub fn open_store(settings: &Settings) -> StoreResult<IniConfigStore> {
    let store = IniConfigStore::open(&settings.store.path)?;
    Ok(match &settings.store.defaults {
        Some(defaults) => store.with_defaults(defaults),
        None => store,
    })
}
