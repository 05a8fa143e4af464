//! # RFC Store
//!
//! Parameter store contract and backends for the RFC sync agent.
//!
//! The sync engine never talks to the device's parameter database
//! directly. It consumes only the [`ConfigStore`] get/set contract:
//! typed reads that may be served from a defaults layer, and owner-tagged
//! writes that either succeed or report a status. Values round-trip byte
//! for byte; the type only decides when two values are equal.
//!
//! ## Available Backends
//!
//! - [`MemoryConfigStore`] - For testing; records every write
//! - [`IniConfigStore`] - `name=value` file with an optional defaults file
//!
//! ## Example
//!
//! ```rust
//! use rfc_store::{ConfigStore, MemoryConfigStore};
//!
//! let store = MemoryConfigStore::new();
//! store.set("rfc", "Device.Test.Enable", "true").unwrap();
//! assert_eq!(store.get_value("Device.Test.Enable").unwrap().as_deref(), Some("true"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::IniConfigStore;
pub use memory::{MemoryConfigStore, StoreWrite};
pub use store::{ConfigStore, Param, ParamType, ReadSource};
