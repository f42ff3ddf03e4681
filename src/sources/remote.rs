//! Reqwest-backed HTTP transport.

use super::{HttpAuth, HttpTransport, TransportRequest, TransportResponse};
use crate::error::{ConfigError, Result, TransportError};
use async_trait::async_trait;
use reqwest::{Client, header::HeaderValue};
use std::time::Duration;

/// HTTP transport built on `reqwest`.
///
/// Supports bearer and basic authentication and a configurable per-request
/// timeout. Non-2xx responses are returned as-is so the fetcher can classify
/// them.
///
/// # Examples
///
/// ```rust,no_run
/// use server_config::sources::ReqwestTransport;
/// use std::time::Duration;
///
/// # fn example() -> server_config::error::Result<()> {
/// let transport = ReqwestTransport::builder()
///     .with_timeout(Duration::from_secs(5))
///     .with_user_agent("my-sdk/1.0")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a new builder for constructing a reqwest transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Per-request timeout applied by the underlying client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: TransportRequest) -> std::result::Result<TransportResponse, TransportError> {
        let mut builder = self.client.get(&request.url);

        builder = match &request.auth {
            HttpAuth::None => builder,
            HttpAuth::Bearer(token) => {
                let header_value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| TransportError::InvalidRequest(format!("Invalid bearer token: {}", e)))?;
                builder.header("Authorization", header_value)
            }
            HttpAuth::Basic(username, password) => builder.basic_auth(username, Some(password)),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        Ok(TransportResponse { status, body })
    }

    fn name(&self) -> String {
        "reqwest".to_string()
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

/// Builder for constructing a `ReqwestTransport`.
pub struct ReqwestTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl ReqwestTransportBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: None,
        }
    }

    /// Set the request timeout.
    ///
    /// Default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the `User-Agent` header sent with every request.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ReqwestTransport> {
        let mut client = Client::builder().timeout(self.timeout);
        if let Some(user_agent) = self.user_agent {
            client = client.user_agent(user_agent);
        }

        let client = client
            .build()
            .map_err(|e| ConfigError::Runtime(format!("Failed to create HTTP client: {}", e)))?;

        Ok(ReqwestTransport {
            client,
            timeout: self.timeout,
        })
    }
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let transport = ReqwestTransport::builder()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent")
            .build()
            .unwrap();

        assert_eq!(transport.timeout(), Duration::from_secs(5));
        assert_eq!(transport.name(), "reqwest");
    }

    #[tokio::test]
    async fn test_basic_auth_and_status_passthrough() {
        let mut server = mockito::Server::new_async().await;
        // "key:" base64-encoded
        let mock = server
            .mock("GET", "/sourceConfig")
            .match_header("authorization", "Basic a2V5Og==")
            .match_header("x-extra", "1")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let transport = ReqwestTransport::builder().build().unwrap();
        let request = TransportRequest::new(format!("{}/sourceConfig", server.url()))
            .with_auth(HttpAuth::Basic("key".to_string(), String::new()))
            .with_header("x-extra", "1");

        let response = transport.get(request).await.unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(response.body, "unauthorized");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = ReqwestTransport::builder()
            .with_timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        // Port 9 (discard) on localhost is closed on test hosts.
        let result = transport
            .get(TransportRequest::new("http://127.0.0.1:9/sourceConfig"))
            .await;
        assert!(result.is_err());
    }
}
