//! Reconciliation of a fetch outcome with the cached configuration.

use crate::core::{
    CachedConfig, ConfigCache, DestinationToTransformationMapping, ErrorState, FetchOutcome,
    SourceConfig,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where the effective configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Freshly fetched from the control plane.
    Fetched,
    /// Read back from the cache after the fetch failed.
    Cache,
    /// No configuration is available.
    Empty,
}

/// The effective configuration, routing data and error state of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Effective configuration, if any.
    pub config: Option<Arc<SourceConfig>>,
    /// Mapping derived from `config`; empty when there is none.
    pub mapping: Arc<DestinationToTransformationMapping>,
    /// Outcome reported to consumers.
    pub error: ErrorState,
    /// Where `config` came from.
    pub origin: ConfigOrigin,
    /// When `config` was fetched from the control plane.
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Decides the effective configuration from a fetch outcome and the cache.
///
/// | outcome | result config | error |
/// |---|---|---|
/// | success | parsed document, cache updated | `None` |
/// | network failure | cached value or none | `NetworkError` |
/// | invalid write key | cached value or none | `WrongWriteKey` |
#[derive(Clone)]
pub struct ConfigResolver {
    cache: ConfigCache,
}

impl ConfigResolver {
    /// Create a resolver writing successful fetches to `cache`.
    pub fn new(cache: ConfigCache) -> Self {
        Self { cache }
    }

    /// The cache this resolver writes to.
    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    /// Resolve `outcome` against `cached`.
    ///
    /// A success body that cannot be parsed is handled like a network failure,
    /// and the cache is left untouched. A failed cache write is logged and does
    /// not change the result.
    pub fn resolve(&self, outcome: FetchOutcome, cached: Option<CachedConfig>) -> Resolution {
        match outcome {
            FetchOutcome::Success(document) => match SourceConfig::from_document(document.as_str()) {
                Ok(config) => {
                    let fetched_at = Utc::now();
                    if let Err(e) = self.cache.store(&config, fetched_at) {
                        error!(error = %e, "failed to persist server config");
                    }
                    let config = Arc::new(config);
                    info!(
                        source = %config.id,
                        destinations = config.destinations.len(),
                        "resolved fresh server config"
                    );
                    Resolution {
                        mapping: Arc::new(DestinationToTransformationMapping::from_config(&config)),
                        config: Some(config),
                        error: ErrorState::None,
                        origin: ConfigOrigin::Fetched,
                        fetched_at: Some(fetched_at),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "server returned an unusable config document");
                    fallback(cached, ErrorState::NetworkError)
                }
            },
            FetchOutcome::NetworkFailure(reason) => {
                warn!(reason = %reason, "falling back after network failure");
                fallback(cached, ErrorState::NetworkError)
            }
            FetchOutcome::InvalidWriteKey => {
                error!("write key rejected by the control plane");
                fallback(cached, ErrorState::WrongWriteKey)
            }
        }
    }
}

fn fallback(cached: Option<CachedConfig>, error: ErrorState) -> Resolution {
    match cached {
        Some(cached) => {
            info!(fetched_at = %cached.fetched_at, error = %error, "using cached server config");
            Resolution {
                mapping: Arc::new(DestinationToTransformationMapping::from_config(&cached.config)),
                config: Some(cached.config),
                error,
                origin: ConfigOrigin::Cache,
                fetched_at: Some(cached.fetched_at),
            }
        }
        None => Resolution {
            config: None,
            mapping: Arc::new(DestinationToTransformationMapping::new()),
            error,
            origin: ConfigOrigin::Empty,
            fetched_at: None,
        },
    }
}
