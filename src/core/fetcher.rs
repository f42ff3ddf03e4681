//! Authenticated retrieval of the source configuration.

use crate::core::WriteKey;
use crate::error::{ConfigError, Result, TransportError};
use crate::sources::{HttpAuth, HttpTransport, TransportRequest, TransportResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Raw response body of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument(pub String);

impl RawDocument {
    /// The body as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of one [`ConfigFetcher::fetch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server returned a document.
    Success(RawDocument),
    /// The server rejected the write key. Never retried.
    InvalidWriteKey,
    /// The server could not be reached, or kept failing, until retries ran out.
    NetworkFailure(String),
}

impl FetchOutcome {
    /// Label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::InvalidWriteKey => "invalid_write_key",
            Self::NetworkFailure(_) => "network_failure",
        }
    }
}

/// Bounded exponential backoff between network failures.
///
/// Attempt 1 runs immediately; before attempt `n + 1` the fetcher sleeps
/// `initial_backoff * multiplier^(n - 1)`. The multiplier is at least 2 so
/// consecutive delays strictly increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    multiplier: u32,
}

impl RetryPolicy {
    /// Create a policy.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_attempts` is 0, `initial_backoff` is zero, or
    /// `multiplier` is below 2.
    pub fn new(max_attempts: u32, initial_backoff: Duration, multiplier: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidOption {
                option: "max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if initial_backoff.is_zero() {
            return Err(ConfigError::InvalidOption {
                option: "initial_backoff",
                reason: "must be greater than zero".to_string(),
            });
        }
        if multiplier < 2 {
            return Err(ConfigError::InvalidOption {
                option: "multiplier",
                reason: "must be at least 2".to_string(),
            });
        }
        Ok(Self {
            max_attempts,
            initial_backoff,
            multiplier,
        })
    }

    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Total number of attempts, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }

    /// All delays the policy may sleep, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|retry| self.delay_before_retry(retry))
    }

    /// Worst-case duration of one fetch: every attempt runs into
    /// `request_timeout` and every backoff delay is slept.
    pub fn ceiling(&self, request_timeout: Duration) -> Duration {
        let backoff = self
            .delays()
            .fold(Duration::ZERO, |total, delay| total.saturating_add(delay));
        request_timeout
            .saturating_mul(self.max_attempts)
            .saturating_add(backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

enum Attempt {
    Done(FetchOutcome),
    Retryable(String),
}

/// Performs the authenticated GET against the control plane and classifies the result.
///
/// # Examples
///
/// ```rust,no_run
/// use server_config::core::{ConfigFetcher, RetryPolicy, WriteKey};
/// use server_config::sources::ReqwestTransport;
/// use std::sync::Arc;
///
/// # async fn example() -> server_config::error::Result<()> {
/// let fetcher = ConfigFetcher::new(
///     Arc::new(ReqwestTransport::builder().build()?),
///     "https://api.rudderlabs.com/sourceConfig?p=rust&v=0.1.0",
///     RetryPolicy::default(),
/// );
/// let outcome = fetcher.fetch(&WriteKey::new("my-write-key")?).await;
/// println!("{}", outcome.kind());
/// # Ok(())
/// # }
/// ```
pub struct ConfigFetcher {
    transport: Arc<dyn HttpTransport>,
    url: String,
    retry: RetryPolicy,
}

impl ConfigFetcher {
    /// Create a fetcher for the fully-qualified source-config `url`.
    pub fn new(transport: Arc<dyn HttpTransport>, url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            url: url.into(),
            retry,
        }
    }

    /// URL requested on every attempt.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Retry policy applied between network failures.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetch the configuration for `write_key`.
    ///
    /// Retries network failures according to the retry policy. An
    /// authorization rejection ends the call immediately.
    pub async fn fetch(&self, write_key: &WriteKey) -> FetchOutcome {
        let mut last_reason = String::new();

        for attempt in 1..=self.retry.max_attempts() {
            if attempt > 1 {
                let delay = self.retry.delay_before_retry(attempt - 1);
                warn!(
                    attempt,
                    delay = ?delay,
                    reason = %last_reason,
                    "server config fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(attempt, transport = %self.transport.name(), url = %self.url, "fetching server config");
            let request = TransportRequest::new(self.url.clone())
                .with_auth(HttpAuth::Basic(write_key.as_str().to_string(), String::new()))
                .with_header("Accept", "application/json");

            match classify(self.transport.get(request).await) {
                Attempt::Done(outcome) => {
                    info!(attempt, outcome = outcome.kind(), "server config fetch finished");
                    return outcome;
                }
                Attempt::Retryable(reason) => last_reason = reason,
            }
        }

        warn!(
            attempts = self.retry.max_attempts(),
            reason = %last_reason,
            "server config fetch gave up"
        );
        FetchOutcome::NetworkFailure(last_reason)
    }
}

fn classify(response: std::result::Result<TransportResponse, TransportError>) -> Attempt {
    match response {
        Ok(response) => match response.status {
            200..=299 if response.body.trim().is_empty() => {
                Attempt::Retryable(format!("status {} with empty body", response.status))
            }
            200..=299 => Attempt::Done(FetchOutcome::Success(RawDocument(response.body))),
            401 | 403 => Attempt::Done(FetchOutcome::InvalidWriteKey),
            status => Attempt::Retryable(format!("unexpected status {}", status)),
        },
        Err(e) => Attempt::Retryable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<std::result::Result<TransportResponse, TransportError>>>,
        calls: Mutex<Vec<(Instant, TransportRequest)>>,
    }

    impl ScriptedTransport {
        fn new(
            responses: Vec<std::result::Result<TransportResponse, TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(
            &self,
            request: TransportRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            self.calls.lock().push((Instant::now(), request));
            self.responses
                .lock()
                .pop_front()
                .unwrap_or(Err(TransportError::Connect("refused".to_string())))
        }

        fn name(&self) -> String {
            "scripted".to_string()
        }
    }

    fn key() -> WriteKey {
        WriteKey::new("test-key").unwrap()
    }

    fn fetcher(transport: Arc<ScriptedTransport>) -> ConfigFetcher {
        ConfigFetcher::new(transport, "http://cp.test/sourceConfig", RetryPolicy::default())
    }

    #[test]
    fn test_retry_policy_validation() {
        assert!(RetryPolicy::new(0, Duration::from_millis(1), 2).is_err());
        assert!(RetryPolicy::new(3, Duration::ZERO, 2).is_err());
        assert!(RetryPolicy::new(3, Duration::from_millis(1), 1).is_err());
        assert!(RetryPolicy::new(3, Duration::from_millis(1), 3).is_ok());
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100), 2).unwrap();
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
        assert_eq!(
            policy.ceiling(Duration::from_secs(1)),
            Duration::from_millis(4700)
        );
        assert_eq!(RetryPolicy::no_retry().delays().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let transport = ScriptedTransport::new(vec![Ok(TransportResponse::new(200, "{}"))]);
        let outcome = fetcher(transport.clone()).fetch(&key()).await;

        assert_eq!(outcome, FetchOutcome::Success(RawDocument("{}".to_string())));
        assert_eq!(transport.call_count(), 1);

        let calls = transport.calls.lock();
        let request = &calls[0].1;
        assert_eq!(request.url, "http://cp.test/sourceConfig");
        assert_eq!(
            request.auth,
            HttpAuth::Basic("test-key".to_string(), String::new())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_write_key_is_not_retried() {
        for status in [401, 403] {
            let transport = ScriptedTransport::new(vec![
                Ok(TransportResponse::new(status, "")),
                Ok(TransportResponse::new(200, "{}")),
            ]);
            let outcome = fetcher(transport.clone()).fetch(&key()).await;

            assert_eq!(outcome, FetchOutcome::InvalidWriteKey);
            assert_eq!(transport.call_count(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout),
            Ok(TransportResponse::new(503, "busy")),
            Ok(TransportResponse::new(200, r#"{"source":{}}"#)),
        ]);
        let outcome = fetcher(transport.clone()).fetch(&key()).await;

        assert!(matches!(outcome, FetchOutcome::Success(_)));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling_with_increasing_backoff() {
        let transport = ScriptedTransport::new(Vec::new());
        let outcome = fetcher(transport.clone()).fetch(&key()).await;

        assert!(matches!(outcome, FetchOutcome::NetworkFailure(_)));
        assert_eq!(transport.call_count(), 4);

        let calls = transport.calls.lock();
        let gaps: Vec<Duration> = calls
            .windows(2)
            .map(|pair| pair[1].0.duration_since(pair[0].0))
            .collect();
        assert_eq!(gaps.len(), 3);
        assert!(gaps.windows(2).all(|pair| pair[1] > pair[0]));
        assert!(gaps[0] >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_body_and_other_statuses_are_retryable() {
        let transport = ScriptedTransport::new(vec![
            Ok(TransportResponse::new(200, "  ")),
            Ok(TransportResponse::new(404, "")),
            Ok(TransportResponse::new(429, "")),
            Ok(TransportResponse::new(500, "")),
        ]);
        let outcome = fetcher(transport.clone()).fetch(&key()).await;

        match outcome {
            FetchOutcome::NetworkFailure(reason) => assert!(reason.contains("500")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(transport.call_count(), 4);
    }
}
