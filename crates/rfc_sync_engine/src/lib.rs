//! # RFC Sync Engine
//!
//! Sync state machine, reconciler and transport contract for the RFC
//! (remote feature control) sync agent.
//!
//! This crate provides:
//! - The per-cycle state machine (Init → {Local | Redo | RedoWithValidData} → Finish)
//! - Two-phase identity correction on the first request after boot or upgrade
//! - Conditional-fetch cache tracking (`configsethash` / `configsettime`)
//! - Manifest reconciliation against a [`rfc_store::ConfigStore`]
//! - Bounded retry and a 24h direct-path circuit breaker
//! - A transport contract with mTLS credential fallback
//!
//! ## Architecture
//!
//! One call to [`SyncEngine::sync`] is one cycle:
//! 1. Build a [`SyncSession`] from the store, property files and artifacts
//! 2. Fetch the manifest, at most `max_attempts` times
//! 3. 200 → reconcile and persist a new cache token; 304 → nothing to do;
//!    404 → purge feature artifacts; anything else → retry
//!
//! ## Key Invariants
//!
//! - Every reconciliation is bracketed by clear-begin and clear-end markers
//! - A valid AccountID survives the clear bracket
//! - Unchanged overrides are not rewritten, except bootstrap and managed keys
//! - A fresh direct-block marker means zero fetches
//! - Nothing in a cycle terminates the host process

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod artifacts;
mod breaker;
mod cache;
mod config;
mod context;
mod error;
mod http;
mod properties;
mod reconciler;
mod state;
mod telemetry;
mod transport;

pub use artifacts::ArtifactStore;
pub use breaker::{BlockStatus, DirectBlock};
pub use cache::CacheTracker;
pub use config::{RetryConfig, SyncConfig};
pub use context::{IdentityCorrection, SyncContext};
pub use error::{SyncError, SyncResult};
pub use http::{
    CredentialError, CredentialProvider, HttpClient, HttpTransport, MtlsCredentials, NoCredentials,
};
pub use properties::{read_properties, server_url_from, DeviceProperties};
pub use reconciler::{AccountStash, ReconcileReport, Reconciler};
pub use state::{CycleOutcome, CycleStatus, Lane, SyncEngine, SyncSession, SyncState, SyncStats};
pub use telemetry::{markers, MemoryTelemetry, Telemetry, TelemetryEvent, TracingTelemetry};
pub use transport::{
    FetchRequest, FetchResponse, MockTransport, TransportClient, TransportCode, TransportError,
};
