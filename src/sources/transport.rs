//! HTTP transport trait.

use crate::error::TransportError;
use async_trait::async_trait;

/// Authentication method for HTTP requests.
#[derive(Clone, PartialEq, Eq)]
pub enum HttpAuth {
    /// No authentication
    None,
    /// Bearer token authentication
    Bearer(String),
    /// Basic authentication (username, password)
    Basic(String, String),
}

impl std::fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bearer(_) => write!(f, "Bearer(<redacted>)"),
            Self::Basic(_, _) => write!(f, "Basic(<redacted>)"),
        }
    }
}

/// A single GET request issued by the fetcher.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// Absolute URL to fetch.
    pub url: String,
    /// Credentials to attach.
    pub auth: HttpAuth,
    /// Additional headers as (name, value) pairs.
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    /// Create an unauthenticated request for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: HttpAuth::None,
            headers: Vec::new(),
        }
    }

    /// Attach credentials to the request.
    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Add a header to the request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Status code and body returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

impl TransportResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Trait for the HTTP collaborator used to reach the control plane.
///
/// Implement this trait to plug a different HTTP stack into the fetcher, or to
/// script responses in tests. A non-2xx status is *not* an error at this level:
/// the fetcher classifies statuses itself.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET request.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no HTTP response was received.
    async fn get(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;

    /// Get a human-readable name for this transport (for logging/debugging).
    fn name(&self) -> String;
}
