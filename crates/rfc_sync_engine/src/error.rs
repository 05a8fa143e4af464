//! Error types for the sync engine.

use crate::transport::TransportError;
use rfc_store::StoreError;
use rfc_sync_protocol::ParseError;
use std::time::Duration;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that end a sync cycle.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A single fetch failed at the transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a status the agent does not handle.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The manifest could not be interpreted.
    #[error("manifest error: {0}")]
    Manifest(#[from] ParseError),

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An artifact or marker file could not be accessed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No server URL could be determined.
    #[error("no Xconf server URL configured")]
    MissingServerUrl,

    /// The direct path is blocked by a recent failure marker.
    #[error("direct path blocked for another {}s", .remaining.as_secs())]
    DirectBlocked {
        /// Time until the marker expires.
        remaining: Duration,
    },

    /// Every attempt of the cycle failed.
    #[error("sync failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last failure.
        last: String,
    },
}

impl SyncError {
    /// Returns true if the failure may clear up on another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::HttpStatus(status) => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}
