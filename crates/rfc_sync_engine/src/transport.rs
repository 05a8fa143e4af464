//! Transport layer abstraction for manifest fetches.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Transport-level failure code, numbered like libcurl's `CURLcode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportCode(pub i32);

impl TransportCode {
    /// Failure with no more specific classification.
    pub const UNKNOWN: Self = Self(-1);
    /// Host name could not be resolved.
    pub const COULDNT_RESOLVE_HOST: Self = Self(6);
    /// TCP connection failed.
    pub const COULDNT_CONNECT: Self = Self(7);
    /// Body shorter than announced.
    pub const PARTIAL_FILE: Self = Self(18);
    /// Request timed out.
    pub const OPERATION_TIMEDOUT: Self = Self(28);
    /// TLS handshake failed.
    pub const SSL_CONNECT_ERROR: Self = Self(35);
    /// Receiving data failed.
    pub const RECV_ERROR: Self = Self(56);
    /// Local client certificate problem.
    pub const SSL_CERTPROBLEM: Self = Self(58);
    /// Peer certificate could not be verified.
    pub const PEER_FAILED_VERIFICATION: Self = Self(60);

    /// Codes reported to telemetry as certificate/connectivity errors.
    pub const REPORTED: [i32; 18] = [
        6, 18, 28, 35, 51, 53, 54, 58, 59, 60, 64, 66, 77, 80, 82, 83, 90, 91,
    ];

    /// Returns true if failures with this code are reported to telemetry.
    pub fn is_reported(self) -> bool {
        Self::REPORTED.contains(&self.0)
    }

    /// Returns true if the local client certificate could not be used.
    pub fn is_credential_problem(self) -> bool {
        self == Self::SSL_CERTPROBLEM
    }
}

impl fmt::Display for TransportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A failed exchange that produced no HTTP status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport error {code}: {message}")]
pub struct TransportError {
    /// Classified failure code.
    pub code: TransportCode,
    /// Human readable detail.
    pub message: String,
}

impl TransportError {
    /// Creates a transport error.
    pub fn new(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// One manifest request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Full URL including query.
    pub url: String,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    /// Creates a request without headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds request headers.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Looks up a request header (any case).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response of any status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
    /// Response headers.
    pub headers: Vec<(String, String)>,
}

impl FetchResponse {
    /// Creates a response with the given status and an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Creates a 200 response carrying `body`.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::status(200)
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A transport performs one authenticated request/response exchange.
///
/// Any HTTP status is a successful exchange; only failures that produce
/// no status are errors. Implementations must not retry internally.
pub trait TransportClient: Send + Sync {
    /// Fetches `request.url` with the given headers.
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

impl<T: TransportClient + ?Sized> TransportClient for Arc<T> {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        (**self).fetch(request)
    }
}

impl<T: TransportClient + ?Sized> TransportClient for &T {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        (**self).fetch(request)
    }
}

type Scripted = Result<FetchResponse, TransportError>;

/// A scripted transport for testing.
///
/// Responses are served in the order they were queued. When the queue is
/// empty the fallback is served; without a fallback the fetch fails with
/// [`TransportCode::COULDNT_CONNECT`]. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Option<Scripted>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: FetchResponse) {
        self.queue.lock().push_back(Ok(response));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: TransportError) {
        self.queue.lock().push_back(Err(error));
    }

    /// Sets the response served once the queue is empty.
    pub fn set_fallback(&self, response: Result<FetchResponse, TransportError>) {
        *self.fallback.lock() = Some(response);
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received so far.
    pub fn fetch_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of queued responses not yet served.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl TransportClient for MockTransport {
    fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        self.requests.lock().push(request.clone());
        if let Some(next) = self.queue.lock().pop_front() {
            return next;
        }
        self.fallback.lock().clone().unwrap_or_else(|| {
            Err(TransportError::new(
                TransportCode::COULDNT_CONNECT,
                "no scripted response",
            ))
        })
    }
}
