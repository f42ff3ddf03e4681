//! The public handle that owns the resolved server configuration.

use crate::core::{
    ConfigFetcher, ConfigResolver, DestinationToTransformationMapping, ErrorState, FetchOutcome,
    ManagerState, Resolution, ServerConfigBuilder, SourceConfig, WriteKey,
};
use crate::error::{ConfigError, Result};
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info};

#[cfg(feature = "metrics")]
use crate::metrics::FetchMetrics;

/// State shared between the manager handles and the worker thread.
struct Shared {
    /// Published once by the worker, read lock-free afterwards
    snapshot: ArcSwapOption<Resolution>,
    state: Mutex<ManagerState>,
    resolved: Condvar,
    ready_tx: watch::Sender<bool>,
}

impl Shared {
    fn set_state(&self, next: ManagerState) {
        *self.state.lock() = next;
    }

    fn publish(&self, resolution: Resolution) {
        let mut state = self.state.lock();
        self.snapshot.store(Some(Arc::new(resolution)));
        *state = ManagerState::Resolved;
        self.resolved.notify_all();
        drop(state);
        self.ready_tx.send_replace(true);
    }
}

/// Everything the worker needs to run one fetch-resolve cycle.
pub(crate) struct Cycle {
    pub(crate) write_key: WriteKey,
    pub(crate) fetcher: ConfigFetcher,
    pub(crate) resolver: ConfigResolver,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Option<FetchMetrics>,
}

impl Cycle {
    fn run(self, shared: &Shared) {
        shared.set_state(ManagerState::Fetching);

        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(FetchMetrics::start_fetch);

        let outcome = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => {
                let fetch = || runtime.block_on(self.fetcher.fetch(&self.write_key));
                match panic::catch_unwind(AssertUnwindSafe(fetch)) {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(panic = %message, "server config fetch panicked");
                        FetchOutcome::NetworkFailure(format!("fetch panicked: {}", message))
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "failed to start runtime for server config fetch");
                FetchOutcome::NetworkFailure(format!("runtime unavailable: {}", e))
            }
        };

        let cached = self.resolver.cache().load();
        let resolution = self.resolver.resolve(outcome, cached);

        #[cfg(feature = "metrics")]
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            metrics.record_resolution(&resolution, timer);
        }

        info!(
            error = %resolution.error,
            origin = ?resolution.origin,
            "server config resolved"
        );
        shared.publish(resolution);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Owns the server configuration of one write key.
///
/// Construction starts exactly one fetch-resolve cycle on a background
/// thread. The `get_*` methods block until that cycle finished (bounded by the
/// ready timeout) and then return values from an immutable snapshot, so any
/// number of threads can read concurrently without locking.
///
/// Cloning is cheap and every clone observes the same snapshot.
///
/// # Examples
///
/// ```rust,no_run
/// use server_config::prelude::*;
///
/// # fn example() -> Result<()> {
/// let manager = ServerConfigManager::builder("my-write-key")
///     .with_control_plane_url("https://api.rudderlabs.com")
///     .build()?;
///
/// if manager.get_error()? == ErrorState::WrongWriteKey {
///     eprintln!("check the write key");
/// }
/// let mapping = manager.get_destination_to_transformation_mapping()?;
/// println!("{} destinations have transformations", mapping.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServerConfigManager {
    write_key: WriteKey,
    shared: Arc<Shared>,
    ready_rx: watch::Receiver<bool>,
    ready_timeout: Duration,
}

impl ServerConfigManager {
    /// Create a new builder for `write_key`.
    pub fn builder(write_key: impl Into<String>) -> ServerConfigBuilder {
        ServerConfigBuilder::new(write_key)
    }

    /// Create a manager with default options.
    ///
    /// # Errors
    ///
    /// See [`ServerConfigBuilder::build`].
    pub fn new(write_key: impl Into<String>) -> Result<Self> {
        Self::builder(write_key).build()
    }

    /// Start the cycle on a worker thread and return the handle.
    pub(crate) fn spawn(cycle: Cycle, ready_timeout: Duration) -> Result<Self> {
        let (ready_tx, ready_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            snapshot: ArcSwapOption::empty(),
            state: Mutex::new(ManagerState::Uninitialized),
            resolved: Condvar::new(),
            ready_tx,
        });
        let write_key = cycle.write_key.clone();

        let worker_shared = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("server-config-fetch".to_string())
            .spawn(move || cycle.run(&worker_shared))
            .map_err(|e| ConfigError::Runtime(format!("Failed to spawn fetch worker: {}", e)))?;

        debug!(write_key = ?write_key, "server config fetch started");
        Ok(Self {
            write_key,
            shared,
            ready_rx,
            ready_timeout,
        })
    }

    /// The write key this manager fetches for.
    pub fn write_key(&self) -> &WriteKey {
        &self.write_key
    }

    /// Maximum time the blocking getters wait for resolution.
    pub fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    /// Current lifecycle state. Never blocks.
    pub fn state(&self) -> ManagerState {
        *self.shared.state.lock()
    }

    /// The resolved snapshot, or `None` if the cycle has not finished. Never blocks.
    pub fn try_snapshot(&self) -> Option<Arc<Resolution>> {
        self.shared.snapshot.load_full()
    }

    /// Block until the cycle finished or `timeout` elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotReady`] if the cycle is still running after `timeout`.
    pub fn wait_until_resolved(&self, timeout: Duration) -> Result<Arc<Resolution>> {
        if let Some(snapshot) = self.try_snapshot() {
            return Ok(snapshot);
        }

        let mut state = self.shared.state.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while *state != ManagerState::Resolved {
                    if self
                        .shared
                        .resolved
                        .wait_until(&mut state, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
            }
            // Too far out to represent: wait without a deadline.
            None => {
                while *state != ManagerState::Resolved {
                    self.shared.resolved.wait(&mut state);
                }
            }
        }
        drop(state);

        self.try_snapshot().ok_or(ConfigError::NotReady(timeout))
    }

    /// Wait for the cycle without blocking the async runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotReady`] if the cycle is still running after the
    /// ready timeout.
    pub async fn resolved(&self) -> Result<Arc<Resolution>> {
        let mut ready_rx = self.ready_rx.clone();
        let ready = matches!(
            tokio::time::timeout(self.ready_timeout, ready_rx.wait_for(|ready| *ready)).await,
            Ok(Ok(_))
        );
        if !ready {
            return Err(ConfigError::NotReady(self.ready_timeout));
        }
        self.try_snapshot()
            .ok_or(ConfigError::NotReady(self.ready_timeout))
    }

    fn snapshot(&self) -> Result<Arc<Resolution>> {
        self.wait_until_resolved(self.ready_timeout)
    }

    /// The effective configuration: freshly fetched, cached, or none.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotReady`] if the cycle did not finish within the
    /// ready timeout.
    pub fn get_config(&self) -> Result<Option<Arc<SourceConfig>>> {
        Ok(self.snapshot()?.config.clone())
    }

    /// Destination id → transformation id for the effective configuration.
    ///
    /// Empty when no configuration is available.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotReady`] if the cycle did not finish within the
    /// ready timeout.
    pub fn get_destination_to_transformation_mapping(
        &self,
    ) -> Result<Arc<DestinationToTransformationMapping>> {
        Ok(Arc::clone(&self.snapshot()?.mapping))
    }

    /// Outcome of the fetch.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotReady`] if the cycle did not finish within the
    /// ready timeout.
    pub fn get_error(&self) -> Result<ErrorState> {
        Ok(self.snapshot()?.error)
    }

    /// When the effective configuration was fetched from the control plane.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotReady`] if the cycle did not finish within the
    /// ready timeout.
    pub fn fetched_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.snapshot()?.fetched_at)
    }
}

impl std::fmt::Debug for ServerConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfigManager")
            .field("write_key", &self.write_key)
            .field("state", &self.state())
            .finish()
    }
}
