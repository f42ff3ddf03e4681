//! # server-config
//!
//! Retrieval of the source configuration behind an analytics SDK write key.
//!
//! ## Overview
//!
//! Given a write key, `server-config` fetches the source-configuration document
//! from the control plane, keeps the last good copy in a local store for
//! offline starts, and exposes a typed, read-only view to the rest of the SDK:
//! - The source and its destinations ([`SourceConfig`](core::SourceConfig))
//! - Destination → transformation routing
//!   ([`DestinationToTransformationMapping`](core::DestinationToTransformationMapping))
//! - The outcome of the fetch ([`ErrorState`](core::ErrorState))
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use server_config::prelude::*;
//! use server_config::sources::FileStore;
//! use std::sync::Arc;
//!
//! # fn example() -> server_config::error::Result<()> {
//! let manager = ServerConfigManager::builder("1xXCubSHWXbpBI2h6EpCjKOsxmQ")
//!     .with_store(Arc::new(FileStore::new("/var/lib/my-app/prefs")))
//!     .build()?;
//!
//! // Blocks until the single fetch-resolve cycle finished.
//! match manager.get_error()? {
//!     ErrorState::None => println!("fresh config"),
//!     ErrorState::NetworkError => println!("offline, using cached config if any"),
//!     ErrorState::WrongWriteKey => println!("write key rejected"),
//! }
//!
//! if let Some(config) = manager.get_config()? {
//!     for destination in config.enabled_destinations() {
//!         println!("routing to {}", destination.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure handling
//!
//! - **Network failures** are retried with exponential backoff, then reported as
//!   [`ErrorState::NetworkError`](core::ErrorState::NetworkError).
//! - **Rejected write keys** are never retried and are reported as
//!   [`ErrorState::WrongWriteKey`](core::ErrorState::WrongWriteKey).
//! - **Corrupt caches** and **malformed destination entries** are logged and
//!   skipped.
//!
//! In every case the SDK keeps working with the best configuration available.
//!
//! ## Feature Flags
//!
//! - `http` (default): [`ReqwestTransport`](sources::ReqwestTransport) as the default transport
//! - `metrics`: OpenTelemetry fetch metrics

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod sources;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        DestinationToTransformationMapping, ErrorState, ManagerState, RetryPolicy,
        ServerConfigBuilder, ServerConfigManager, SourceConfig,
    };
    pub use crate::error::{ConfigError, Result};
}
