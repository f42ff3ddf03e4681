//! Built-in metrics for the fetch-resolve cycle.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Cycles started
//! - Resolutions by error state
//! - Cache fallbacks
//! - Cycle duration
//!
//! # Examples
//!
//! ```rust,no_run
//! use server_config::metrics::FetchMetrics;
//! use server_config::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let manager = ServerConfigManager::builder("my-write-key")
//!     .with_metrics(FetchMetrics::new(global::meter("my-app")))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod fetch_metrics;

pub use fetch_metrics::FetchMetrics;
