//! HTTP transport with mutual-TLS credential injection.
//!
//! The actual HTTP client is abstracted via a trait so the engine stays
//! free of any particular HTTP stack. [`HttpTransport`] loads client
//! credentials for every request. When loading fails, or the client
//! rejects the loaded certificate, the same request is issued without
//! them.

use crate::transport::{FetchRequest, FetchResponse, TransportClient, TransportError};
use parking_lot::RwLock;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Client certificate material for mutual TLS.
///
/// The certificate bytes and passphrase are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MtlsCredentials {
    der: Vec<u8>,
    passphrase: String,
    #[zeroize(skip)]
    source: PathBuf,
}

impl MtlsCredentials {
    /// Creates credentials from a PKCS#12 archive.
    pub fn new(der: Vec<u8>, passphrase: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            der,
            passphrase: passphrase.into(),
            source: source.into(),
        }
    }

    /// PKCS#12 archive bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Archive passphrase.
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Where the archive was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl fmt::Debug for MtlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MtlsCredentials")
            .field("source", &self.source)
            .field("der", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// Why client credentials could not be loaded.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No credential source is configured.
    #[error("no client certificate configured")]
    NotConfigured,

    /// None of the candidate certificate files exists.
    #[error("no client certificate found (tried {0:?})")]
    Missing(Vec<PathBuf>),

    /// Every candidate certificate exists but none can be used.
    #[error("no usable client certificate (tried {0:?})")]
    Unusable(Vec<PathBuf>),

    /// The passphrase could not be obtained.
    #[error("certificate passphrase unavailable: {0}")]
    Passphrase(String),

    /// Reading the certificate failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of client credentials.
pub trait CredentialProvider: Send + Sync {
    /// Loads credentials for the next request.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable credentials are available.
    fn load(&self) -> Result<MtlsCredentials, CredentialError>;
}

/// A provider that never has credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn load(&self) -> Result<MtlsCredentials, CredentialError> {
        Err(CredentialError::NotConfigured)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP stack.
pub trait HttpClient: Send + Sync {
    /// Issues a GET request, presenting `credentials` when given.
    ///
    /// # Errors
    ///
    /// Returns a classified [`TransportError`] when no HTTP status was received.
    fn get(
        &self,
        request: &FetchRequest,
        credentials: Option<&MtlsCredentials>,
    ) -> Result<FetchResponse, TransportError>;
}

/// HTTP-based manifest transport.
pub struct HttpTransport<C: HttpClient, P: CredentialProvider> {
    client: C,
    credentials: P,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient, P: CredentialProvider> HttpTransport<C, P> {
    /// Creates a new HTTP transport.
    pub fn new(client: C, credentials: P) -> Self {
        Self {
            client,
            credentials,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }
}

impl<C: HttpClient, P: CredentialProvider> TransportClient for HttpTransport<C, P> {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let credentials = match self.credentials.load() {
            Ok(creds) => {
                debug!(source = %creds.source().display(), "using client certificate");
                Some(creds)
            }
            Err(e) => {
                warn!(error = %e, "mTLS credentials unavailable, sending request without them");
                None
            }
        };

        let mut result = self.client.get(request, credentials.as_ref());
        let unusable = credentials.is_some()
            && matches!(&result, Err(e) if e.code.is_credential_problem());
        if unusable {
            if let Err(e) = &result {
                warn!(
                    code = %e.code,
                    error = %e.message,
                    "client certificate unusable, retrying without it"
                );
            }
            result = self.client.get(request, None);
        }

        match result {
            Ok(response) => {
                *self.last_error.write() = None;
                Ok(response)
            }
            Err(e) => {
                *self.last_error.write() = Some(e.to_string());
                Err(e)
            }
        }
    }
}
