//! # RFC Sync Protocol
//!
//! Xconf feature-control protocol types for the RFC sync agent.
//!
//! This crate provides:
//! - Parameter names shared by the agent and its tools ([`keys`])
//! - [`DeviceIdentity`] and [`BuildClass`]
//! - The manifest model: [`Manifest`], [`Feature`], [`OverrideMap`]
//! - [`UrlBuilder`] for the `getSettings` request URL
//! - [`CacheToken`] and conditional header codec
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod error;
mod identity;
pub mod keys;
mod manifest;
mod url;

pub use cache::{
    extract_config_set_hash, CacheToken, CLEARED_HASH, CONFIG_SET_HASH_HEADER,
    CONFIG_SET_TIME_HEADER, OVERRIDE_HASH, UPGRADE_HASH, ZERO_TIME,
};
pub use error::{ParseError, ProtocolResult};
pub use identity::{is_valid_identity, is_unknown, BuildClass, DeviceIdentity, UNKNOWN};
pub use manifest::{parse_bool, Feature, Manifest, OverrideMap};
pub use url::{base_host, UrlBuilder, UrlFields, SETTINGS_PATH};
