//! PKCS#12 client certificate loading.

use reqwest::Identity;
use rfc_sync_engine::{CredentialError, CredentialProvider, MtlsCredentials};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Checks that an archive opens with a passphrase.
type Validator = fn(&[u8], &str) -> Result<(), String>;

fn open_pkcs12(der: &[u8], passphrase: &str) -> Result<(), String> {
    Identity::from_pkcs12_der(der, passphrase)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Loads the first usable certificate from an ordered candidate list.
///
/// The dynamic device certificate comes first, the static one second.
/// A candidate that does not open with the passphrase is skipped. The
/// passphrase is printed by an external command on every load.
#[derive(Debug, Clone)]
pub struct FileCredentialProvider {
    candidates: Vec<PathBuf>,
    passphrase_command: Option<String>,
    validate: Validator,
}

impl FileCredentialProvider {
    /// Creates a provider over `candidates`.
    pub fn new(candidates: Vec<PathBuf>, passphrase_command: Option<String>) -> Self {
        Self {
            candidates,
            passphrase_command,
            validate: open_pkcs12,
        }
    }

    #[cfg(test)]
    fn with_validator(mut self, validate: Validator) -> Self {
        self.validate = validate;
        self
    }

    fn passphrase(&self) -> Result<Zeroizing<String>, CredentialError> {
        let command = self
            .passphrase_command
            .as_deref()
            .ok_or_else(|| CredentialError::Passphrase("no passphrase command configured".into()))?;
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|e| CredentialError::Passphrase(e.to_string()))?;
        if !output.status.success() {
            return Err(CredentialError::Passphrase(format!(
                "passphrase command exited with {}",
                output.status
            )));
        }
        let stdout = Zeroizing::new(output.stdout);
        let text = String::from_utf8_lossy(&stdout);
        let passphrase = Zeroizing::new(text.trim_end_matches(['\r', '\n']).to_string());
        if passphrase.is_empty() {
            return Err(CredentialError::Passphrase("empty passphrase".into()));
        }
        Ok(passphrase)
    }
}

impl CredentialProvider for FileCredentialProvider {
    fn load(&self) -> Result<MtlsCredentials, CredentialError> {
        if self.candidates.is_empty() {
            return Err(CredentialError::NotConfigured);
        }
        let present: Vec<&PathBuf> = self.candidates.iter().filter(|p| p.is_file()).collect();
        if present.is_empty() {
            return Err(CredentialError::Missing(self.candidates.clone()));
        }
        let passphrase = self.passphrase()?;

        for path in present {
            debug!(path = %path.display(), "loading client certificate");
            let der = match fs::read(path) {
                Ok(der) => Zeroizing::new(der),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "client certificate unreadable");
                    continue;
                }
            };
            match (self.validate)(&der, &passphrase) {
                Ok(()) => {
                    info!(path = %path.display(), "client certificate loaded");
                    return Ok(MtlsCredentials::new(der.to_vec(), passphrase.as_str(), path));
                }
                Err(reason) => {
                    warn!(path = %path.display(), reason = %reason, "client certificate unusable");
                }
            }
        }
        Err(CredentialError::Unusable(self.candidates.clone()))
    }
}
