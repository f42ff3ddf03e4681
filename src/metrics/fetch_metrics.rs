//! Fetch metrics tracking using OpenTelemetry.

use crate::core::{ConfigOrigin, Resolution};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for the fetch-resolve cycle.
///
/// Tracks fetch attempts, resolutions by error state, cache fallbacks and
/// cycle latency using OpenTelemetry metrics.
///
/// # Examples
///
/// ```rust,no_run
/// use server_config::metrics::FetchMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("server-config");
/// let metrics = FetchMetrics::new(meter);
///
/// let timer = metrics.start_fetch();
/// // ... fetch and resolve ...
/// # let _ = timer;
/// ```
#[derive(Clone)]
pub struct FetchMetrics {
    fetch_cycles: Counter<u64>,
    resolutions: Counter<u64>,
    cache_fallbacks: Counter<u64>,
    cycle_duration: Histogram<f64>,
}

impl FetchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let fetch_cycles = meter
            .u64_counter("server_config.fetch.cycles")
            .with_description("Number of fetch-resolve cycles started")
            .build();

        let resolutions = meter
            .u64_counter("server_config.resolutions")
            .with_description("Resolved cycles by error state")
            .build();

        let cache_fallbacks = meter
            .u64_counter("server_config.cache.fallbacks")
            .with_description("Cycles that served the cached configuration")
            .build();

        let cycle_duration = meter
            .f64_histogram("server_config.fetch.duration")
            .with_description("Duration of fetch-resolve cycles in seconds")
            .with_unit("s")
            .build();

        Self {
            fetch_cycles,
            resolutions,
            cache_fallbacks,
            cycle_duration,
        }
    }

    /// Start a cycle timer.
    ///
    /// Pass the returned `Instant` to [`record_resolution`](Self::record_resolution).
    pub fn start_fetch(&self) -> Instant {
        self.fetch_cycles.add(1, &[]);
        Instant::now()
    }

    /// Record the outcome of a cycle.
    pub fn record_resolution(&self, resolution: &Resolution, start: Instant) {
        let attributes = [KeyValue::new("error", resolution.error.as_str())];
        self.resolutions.add(1, &attributes);
        self.cycle_duration
            .record(start.elapsed().as_secs_f64(), &attributes);

        if resolution.origin == ConfigOrigin::Cache {
            self.cache_fallbacks.add(1, &attributes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DestinationToTransformationMapping, ErrorState};
    use opentelemetry::global;
    use std::sync::Arc;

    fn resolution(error: ErrorState, origin: ConfigOrigin) -> Resolution {
        Resolution {
            config: None,
            mapping: Arc::new(DestinationToTransformationMapping::new()),
            error,
            origin,
            fetched_at: None,
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = FetchMetrics::new(global::meter("test"));

        // Test basic operations don't panic
        let timer = metrics.start_fetch();
        metrics.record_resolution(&resolution(ErrorState::None, ConfigOrigin::Fetched), timer);

        let timer = metrics.start_fetch();
        metrics.record_resolution(
            &resolution(ErrorState::NetworkError, ConfigOrigin::Cache),
            timer,
        );
    }

    #[test]
    fn test_metrics_clone() {
        let metrics = FetchMetrics::new(global::meter("test"));
        let metrics2 = metrics.clone();

        let timer1 = metrics.start_fetch();
        let timer2 = metrics2.start_fetch();

        metrics.record_resolution(&resolution(ErrorState::WrongWriteKey, ConfigOrigin::Empty), timer1);
        metrics2.record_resolution(&resolution(ErrorState::None, ConfigOrigin::Fetched), timer2);
    }
}
