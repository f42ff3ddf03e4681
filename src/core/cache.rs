//! Last-known-good configuration cache.

use crate::core::SourceConfig;
use crate::error::Result;
use crate::sources::PreferenceStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Slot the configuration blob is stored under.
pub const CACHE_SLOT: &str = "server_config";

/// A configuration read back from the cache, with the time it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedConfig {
    /// The cached configuration.
    pub config: Arc<SourceConfig>,
    /// When the configuration was fetched from the control plane.
    pub fetched_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct CachedBlobRef<'a> {
    fetched_at: DateTime<Utc>,
    config: &'a SourceConfig,
}

#[derive(Deserialize)]
struct CachedBlob {
    fetched_at: DateTime<Utc>,
    config: SourceConfig,
}

/// Wraps a [`PreferenceStore`] to persist the last successfully resolved configuration.
///
/// Reads never fail: a missing, unreadable or corrupt blob is reported as "no
/// cache".
#[derive(Clone)]
pub struct ConfigCache {
    store: Arc<dyn PreferenceStore>,
    slot: String,
}

impl ConfigCache {
    /// Create a cache over `store` using the default slot.
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            slot: CACHE_SLOT.to_string(),
        }
    }

    /// Use a different slot, e.g. one per write key.
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = slot.into();
        self
    }

    /// Slot this cache reads and writes.
    pub fn slot(&self) -> &str {
        &self.slot
    }

    /// Load the last persisted configuration.
    pub fn load(&self) -> Option<CachedConfig> {
        let raw = match self.store.get_string(&self.slot) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(store = %self.store.name(), slot = %self.slot, "no cached server config");
                return None;
            }
            Err(e) => {
                warn!(store = %self.store.name(), error = %e, "failed to read cached server config");
                return None;
            }
        };

        match serde_json::from_str::<CachedBlob>(&raw) {
            Ok(blob) => {
                debug!(fetched_at = %blob.fetched_at, "loaded cached server config");
                Some(CachedConfig {
                    config: Arc::new(blob.config),
                    fetched_at: blob.fetched_at,
                })
            }
            Err(e) => {
                warn!(slot = %self.slot, error = %e, "cached server config is corrupt, ignoring it");
                None
            }
        }
    }

    /// Persist `config` as fetched at `fetched_at`, replacing any previous blob.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails. The
    /// previous blob is left in place in that case.
    pub fn store(&self, config: &SourceConfig, fetched_at: DateTime<Utc>) -> Result<()> {
        let blob = serde_json::to_string(&CachedBlobRef { fetched_at, config })?;
        self.store.set_string(&self.slot, &blob)?;
        debug!(slot = %self.slot, "stored server config");
        Ok(())
    }

    /// Remove the cached blob.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.slot)
    }
}
