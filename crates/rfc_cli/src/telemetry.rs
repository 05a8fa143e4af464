//! Telemetry 2.0 event client.

use rfc_sync_engine::Telemetry;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

/// Forwards events to the Telemetry 2.0 client binary.
///
/// Every event is also logged, so a device without the client still
/// records them.
#[derive(Debug, Clone)]
pub struct Telemetry2Client {
    client: PathBuf,
    daemon: String,
}

impl Telemetry2Client {
    /// Creates a client invoking `client` and signalling `daemon` on profile changes.
    pub fn new(client: impl Into<PathBuf>, daemon: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            daemon: daemon.into(),
        }
    }

    fn send(&self, marker: &str, value: &str) {
        if !self.client.is_file() {
            debug!(client = %self.client.display(), "telemetry client not installed");
            return;
        }
        let status = Command::new(&self.client)
            .arg(marker)
            .arg(value)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => {}
            Ok(s) => warn!(marker, status = %s, "telemetry client failed"),
            Err(e) => warn!(marker, error = %e, "telemetry client failed"),
        }
    }
}

impl Telemetry for Telemetry2Client {
    fn count(&self, marker: &str) {
        info!(marker, "telemetry count");
        self.send(marker, "1");
    }

    fn value(&self, marker: &str, value: &str) {
        info!(marker, value, "telemetry value");
        self.send(marker, value);
    }

    fn config_url_changed(&self) {
        info!(daemon = %self.daemon, "telemetry profile URL changed, requesting reload");
        let status = Command::new("killall")
            .arg("-12")
            .arg(&self.daemon)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = status {
            warn!(error = %e, "failed to signal telemetry daemon");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn missing_client_is_silent() {
        let telemetry = Telemetry2Client::new("/nonexistent/telemetry2_0_client", "none");
        telemetry.count("SYST_INFO_RFC_Complete");
        telemetry.value("rfc_split", "A=true,");
    }

    #[test]
    fn client_receives_marker_and_value() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("events");
        let script = dir.path().join("client.sh");
        fs::write(
            &script,
            format!("#!/bin/sh\necho \"$1 $2\" >> {}\n", out.display()),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let telemetry = Telemetry2Client::new(&script, "none");
        telemetry.count("SYST_INFO_RFC_Complete");
        telemetry.value("rfc_split", "A=true,");

        let events = fs::read_to_string(&out).unwrap();
        assert_eq!(events, "SYST_INFO_RFC_Complete 1\nrfc_split A=true,\n");
    }
}
