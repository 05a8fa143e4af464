//! Direct-path circuit breaker.
//!
//! The breaker is a marker file. While its mtime is younger than the
//! window, the agent makes no requests at all. An expired marker is
//! removed on the next check.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Result of a breaker check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// No marker present.
    Clear,
    /// Marker present and fresh.
    Blocked {
        /// Time until the marker expires.
        remaining: Duration,
    },
    /// Marker was present but older than the window; it has been removed.
    Expired,
}

impl BlockStatus {
    /// Returns true if fetches must be skipped.
    pub fn is_blocked(self) -> bool {
        matches!(self, BlockStatus::Blocked { .. })
    }
}

/// The direct-block marker.
#[derive(Debug, Clone)]
pub struct DirectBlock {
    path: PathBuf,
    window: Duration,
}

impl DirectBlock {
    /// Creates a breaker backed by `path`.
    pub fn new(path: impl Into<PathBuf>, window: Duration) -> Self {
        Self {
            path: path.into(),
            window,
        }
    }

    /// Marker path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks the marker, removing it once expired.
    ///
    /// A marker dated in the future counts as just written.
    pub fn check(&self) -> io::Result<BlockStatus> {
        let modified = match fs::metadata(&self.path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BlockStatus::Clear),
            Err(e) => return Err(e),
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age < self.window {
            let remaining = self.window - age;
            debug!(remaining_secs = remaining.as_secs(), "direct path blocked");
            return Ok(BlockStatus::Blocked { remaining });
        }

        info!(path = %self.path.display(), "direct-block marker expired, removing");
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
            _ => {}
        }
        Ok(BlockStatus::Expired)
    }

    /// Creates or refreshes the marker.
    pub fn arm(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.set_modified(SystemTime::now())?;
        info!(path = %self.path.display(), "direct path blocked");
        Ok(())
    }
}
