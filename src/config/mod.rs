//! Configuration loading and layering.
//!
//! Handles `.repoprobe.toml` loading, environment variable resolution,
//! and CLI flag merging with proper priority ordering.

pub mod loader;

pub use loader::{
    CacheBackend, CacheConfig, Config, ConfigError, EnrichmentConfig, GitHubConfig, LimitsConfig,
    ProviderConfig,
};
