//! # RFC Testkit
//!
//! Test utilities for the RFC sync agent.
//!
//! This crate provides:
//! - A sample manifest and the artifacts it is expected to produce
//! - A [`TestHarness`] wiring an engine to in-memory collaborators under a temp dir
//! - A [`ManifestBuilder`] for ad hoc manifests
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rfc_testkit::prelude::*;
//!
//! #[test]
//! fn applies_sample() {
//!     let harness = TestHarness::new();
//!     harness.transport.push_response(FetchResponse::ok(SAMPLE_MANIFEST));
//!     let outcome = harness.engine().sync().unwrap();
//!     assert_eq!(outcome.features.as_deref(), Some(SAMPLE_FEATURE_LIST));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use rfc_store::{ConfigStore, MemoryConfigStore};
    pub use rfc_sync_engine::{
        markers, FetchResponse, MemoryTelemetry, MockTransport, SyncConfig, SyncEngine, SyncError,
        TransportCode, TransportError,
    };
    pub use rfc_sync_protocol::keys;
}

pub use fixtures::*;
pub use generators::*;
