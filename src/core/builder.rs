//! Builder for constructing ServerConfigManager instances.

use crate::core::manager::Cycle;
use crate::core::{ConfigCache, ConfigFetcher, ConfigResolver, RetryPolicy, ServerConfigManager, WriteKey};
use crate::error::{ConfigError, Result};
use crate::sources::{HttpTransport, MemoryStore, PreferenceStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[cfg(feature = "metrics")]
use crate::metrics::FetchMetrics;

/// Control plane used when none is configured.
pub const DEFAULT_CONTROL_PLANE_URL: &str = "https://api.rudderlabs.com";

/// Extra time the getters wait beyond the fetcher's own worst case.
const READY_MARGIN: Duration = Duration::from_secs(5);

/// Builder for a [`ServerConfigManager`].
///
/// # Examples
///
/// ```rust,no_run
/// use server_config::prelude::*;
/// use server_config::sources::FileStore;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<()> {
/// let manager = ServerConfigManager::builder("my-write-key")
///     .with_control_plane_url("https://cp.example.com")
///     .with_store(Arc::new(FileStore::new("/var/lib/my-app/prefs")))
///     .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(250), 2)?)
///     .with_request_timeout(Duration::from_secs(5))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ServerConfigBuilder {
    write_key: String,
    control_plane_url: String,
    platform: String,
    sdk_version: String,
    retry: RetryPolicy,
    request_timeout: Duration,
    ready_timeout: Option<Duration>,
    transport: Option<Arc<dyn HttpTransport>>,
    store: Option<Arc<dyn PreferenceStore>>,
    cache_slot: Option<String>,
    #[cfg(feature = "metrics")]
    metrics: Option<FetchMetrics>,
}

impl ServerConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new(write_key: impl Into<String>) -> Self {
        Self {
            write_key: write_key.into(),
            control_plane_url: DEFAULT_CONTROL_PLANE_URL.to_string(),
            platform: "rust".to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            ready_timeout: None,
            transport: None,
            store: None,
            cache_slot: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Set the control plane base URL. A trailing `/` is ignored.
    pub fn with_control_plane_url(mut self, url: impl Into<String>) -> Self {
        self.control_plane_url = url.into();
        self
    }

    /// Set the platform and SDK version reported to the control plane.
    pub fn with_client_info(mut self, platform: impl Into<String>, sdk_version: impl Into<String>) -> Self {
        self.platform = platform.into();
        self.sdk_version = sdk_version.into();
        self
    }

    /// Set the retry policy for network failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the per-request timeout of the default transport.
    ///
    /// Default is 10 seconds. Custom transports enforce their own timeouts, but
    /// this value still feeds the default ready timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set how long the getters block before reporting
    /// [`ConfigError::NotReady`].
    ///
    /// Defaults to the retry policy's worst case plus a small margin.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Use a custom HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Persist the cache in `store`. Defaults to an in-memory store.
    pub fn with_store(mut self, store: Arc<dyn PreferenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom cache slot, e.g. to keep several write keys in one store.
    pub fn with_cache_slot(mut self, slot: impl Into<String>) -> Self {
        self.cache_slot = Some(slot.into());
        self
    }

    /// Record fetch metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: FetchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The source-config URL the fetcher will request.
    ///
    /// # Errors
    ///
    /// Returns an error if the control plane URL is not an http(s) URL.
    pub fn source_config_url(&self) -> Result<String> {
        let invalid = |reason: String| ConfigError::InvalidOption {
            option: "control_plane_url",
            reason,
        };

        let mut url = Url::parse(self.control_plane_url.trim())
            .map_err(|e| invalid(format!("{:?}: {}", self.control_plane_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
            return Err(invalid(format!(
                "expected an http(s) URL, got {:?}",
                self.control_plane_url
            )));
        }

        url.path_segments_mut()
            .map_err(|_| invalid(format!("{:?} cannot be a base URL", self.control_plane_url)))?
            .pop_if_empty()
            .push("sourceConfig");
        url.set_fragment(None);
        url.query_pairs_mut()
            .clear()
            .append_pair("p", &self.platform)
            .append_pair("v", &self.sdk_version);

        Ok(url.into())
    }

    /// Validate the options and start the fetch-resolve cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The write key is invalid
    /// - The control plane URL is not an http(s) URL
    /// - The default transport cannot be constructed
    /// - The worker thread cannot be spawned
    pub fn build(self) -> Result<ServerConfigManager> {
        let write_key = WriteKey::new(self.write_key.clone())?;
        let url = self.source_config_url()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(self.request_timeout, &self.platform, &self.sdk_version)?,
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn PreferenceStore>);

        let mut cache = ConfigCache::new(store);
        if let Some(slot) = self.cache_slot {
            cache = cache.with_slot(slot);
        }

        let ready_timeout = self.ready_timeout.unwrap_or_else(|| {
            self.retry
                .ceiling(self.request_timeout)
                .saturating_add(READY_MARGIN)
        });

        let cycle = Cycle {
            write_key,
            fetcher: ConfigFetcher::new(transport, url, self.retry),
            resolver: ConfigResolver::new(cache),
            #[cfg(feature = "metrics")]
            metrics: self.metrics,
        };

        ServerConfigManager::spawn(cycle, ready_timeout)
    }
}

#[cfg(feature = "http")]
fn default_transport(
    timeout: Duration,
    platform: &str,
    sdk_version: &str,
) -> Result<Arc<dyn HttpTransport>> {
    let transport = crate::sources::ReqwestTransport::builder()
        .with_timeout(timeout)
        .with_user_agent(format!("server-config/{} ({})", sdk_version, platform))
        .build()?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport(
    _timeout: Duration,
    _platform: &str,
    _sdk_version: &str,
) -> Result<Arc<dyn HttpTransport>> {
    Err(ConfigError::InvalidOption {
        option: "transport",
        reason: "no transport configured and the 'http' feature is disabled".to_string(),
    })
}
