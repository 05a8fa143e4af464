//! Blocking reqwest client for manifest requests.

use reqwest::blocking::Client;
use reqwest::Identity;
use rfc_sync_engine::{
    FetchRequest, FetchResponse, HttpClient, MtlsCredentials, TransportCode, TransportError,
};
use std::error::Error as _;
use std::time::Duration;
use tracing::debug;

/// [`HttpClient`] backed by `reqwest::blocking`.
///
/// A fresh client is built per request because the client identity may
/// differ between attempts.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    timeout: Duration,
}

impl ReqwestClient {
    /// Creates a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn build(&self, credentials: Option<&MtlsCredentials>) -> Result<Client, TransportError> {
        let mut builder = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout);
        if let Some(creds) = credentials {
            let identity = Identity::from_pkcs12_der(creds.der(), creds.passphrase()).map_err(|e| {
                TransportError::new(TransportCode::SSL_CERTPROBLEM, format!("client certificate: {e}"))
            })?;
            builder = builder.identity(identity);
        }
        builder
            .build()
            .map_err(|e| TransportError::new(classify(&e), e.to_string()))
    }
}

impl HttpClient for ReqwestClient {
    fn get(
        &self,
        request: &FetchRequest,
        credentials: Option<&MtlsCredentials>,
    ) -> Result<FetchResponse, TransportError> {
        let client = self.build(credentials)?;

        let mut req = client.get(&request.url);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req
            .send()
            .map_err(|e| TransportError::new(classify(&e), describe(&e)))?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| TransportError::new(TransportCode::PARTIAL_FILE, describe(&e)))?;
        debug!(status, bytes = body.len(), "response received");

        Ok(FetchResponse {
            status,
            body: body.to_vec(),
            headers,
        })
    }
}

/// Maps a reqwest failure onto the curl-style codes telemetry reports.
fn classify(error: &reqwest::Error) -> TransportCode {
    if error.is_timeout() {
        return TransportCode::OPERATION_TIMEDOUT;
    }
    let text = describe(error).to_ascii_lowercase();
    classify_message(&text, error.is_connect())
}

fn classify_message(text: &str, is_connect: bool) -> TransportCode {
    if text.contains("dns") || text.contains("resolve") || text.contains("lookup") {
        TransportCode::COULDNT_RESOLVE_HOST
    } else if text.contains("certificate") && text.contains("verif") {
        TransportCode::PEER_FAILED_VERIFICATION
    } else if text.contains("certificate") {
        TransportCode::SSL_CERTPROBLEM
    } else if text.contains("ssl") || text.contains("tls") || text.contains("handshake") {
        TransportCode::SSL_CONNECT_ERROR
    } else if is_connect {
        TransportCode::COULDNT_CONNECT
    } else {
        TransportCode::RECV_ERROR
    }
}

/// Flattens the error chain into one message.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
