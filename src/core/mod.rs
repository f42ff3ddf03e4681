//! Fetch, cache, resolve and expose the server configuration.

mod builder;
mod cache;
mod fetcher;
mod manager;
mod resolver;
mod source_config;
mod state;

pub use builder::{DEFAULT_CONTROL_PLANE_URL, ServerConfigBuilder};
pub use cache::{CACHE_SLOT, CachedConfig, ConfigCache};
pub use fetcher::{ConfigFetcher, FetchOutcome, RawDocument, RetryPolicy};
pub use manager::ServerConfigManager;
pub use resolver::{ConfigOrigin, ConfigResolver, Resolution};
pub use source_config::{
    Destination, DestinationDefinition, DestinationToTransformationMapping, SourceConfig,
};
pub use state::{ErrorState, ManagerState, WriteKey};
