//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.repoprobe.toml` in the working directory
//! 4. `~/.config/repoprobe/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::constants;
use crate::env::Env;
use crate::models::ProviderName;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub github: GitHubConfig,
    pub cache: CacheConfig,
    pub enrichment: EnrichmentConfig,
    pub limits: LimitsConfig,
}

/// LLM provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Gemini,
            model: "gemini-2.0-flash-lite".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

/// GitHub API access.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_base: String,
    pub token: Option<String>,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_base", &self.api_base)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: constants::GITHUB_API_BASE.to_string(),
            token: None,
        }
    }
}

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CacheBackend {
    #[default]
    File,
    Redis,
    Memory,
}

/// Result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub backend: CacheBackend,
    pub ttl_secs: u64,
    pub redis_url: Option<String>,
    /// Overrides the file store directory.
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::File,
            ttl_secs: constants::DEFAULT_CACHE_TTL.as_secs(),
            redis_url: None,
            dir: None,
        }
    }
}

/// Stack Overflow enrichment of bug findings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub max_results: usize,
    pub api_base: String,
    pub site: String,
    pub key: Option<String>,
}

impl std::fmt::Debug for EnrichmentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentConfig")
            .field("enabled", &self.enabled)
            .field("max_results", &self.max_results)
            .field("api_base", &self.api_base)
            .field("site", &self.site)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_results: 3,
            api_base: constants::STACKEXCHANGE_API_BASE.to_string(),
            site: "stackoverflow".to_string(),
            key: None,
        }
    }
}

/// Concurrency, timeout and prompt-size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_concurrent: usize,
    pub llm_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub docs_char_budget: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            llm_timeout_secs: 60,
            http_timeout_secs: 20,
            docs_char_budget: 60_000,
        }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, the local config in `work_dir`, then
    /// applies environment variable overrides.
    pub fn load(work_dir: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: local config
        if let Some(dir) = work_dir {
            let local_path = dir.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        let default_provider = ProviderConfig::default();
        if other.provider.name != default_provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model != default_provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }

        if other.github.api_base != GitHubConfig::default().api_base {
            self.github.api_base = other.github.api_base;
        }
        if other.github.token.is_some() {
            self.github.token = other.github.token;
        }

        // Cache (disabled overrides enabled)
        let default_cache = CacheConfig::default();
        if !other.cache.enabled {
            self.cache.enabled = false;
        }
        if other.cache.backend != default_cache.backend {
            self.cache.backend = other.cache.backend;
        }
        if other.cache.ttl_secs != default_cache.ttl_secs {
            if let Some(secs) = valid_ttl(other.cache.ttl_secs) {
                self.cache.ttl_secs = secs;
            }
        }
        if other.cache.redis_url.is_some() {
            self.cache.redis_url = other.cache.redis_url;
        }
        if other.cache.dir.is_some() {
            self.cache.dir = other.cache.dir;
        }

        // Enrichment (disabled overrides enabled)
        let default_enrichment = EnrichmentConfig::default();
        if !other.enrichment.enabled {
            self.enrichment.enabled = false;
        }
        if other.enrichment.max_results != default_enrichment.max_results {
            self.enrichment.max_results = other.enrichment.max_results;
        }
        if other.enrichment.api_base != default_enrichment.api_base {
            self.enrichment.api_base = other.enrichment.api_base;
        }
        if other.enrichment.site != default_enrichment.site {
            self.enrichment.site = other.enrichment.site;
        }
        if other.enrichment.key.is_some() {
            self.enrichment.key = other.enrichment.key;
        }

        let default_limits = LimitsConfig::default();
        if other.limits.max_concurrent != default_limits.max_concurrent {
            self.limits.max_concurrent = other.limits.max_concurrent;
        }
        if other.limits.llm_timeout_secs != default_limits.llm_timeout_secs {
            self.limits.llm_timeout_secs = other.limits.llm_timeout_secs;
        }
        if other.limits.http_timeout_secs != default_limits.http_timeout_secs {
            self.limits.http_timeout_secs = other.limits.http_timeout_secs;
        }
        if other.limits.docs_char_budget != default_limits.docs_char_budget {
            self.limits.docs_char_budget = other.limits.docs_char_budget;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        if let Some(val) = env.var(constants::ENV_PROVIDER) {
            match val.parse::<ProviderName>() {
                Ok(name) => self.provider.name = name,
                Err(_) => tracing::warn!(variable = constants::ENV_PROVIDER, value = %val, "ignoring invalid provider"),
            }
        }
        if let Some(val) = env.var(constants::ENV_MODEL) {
            self.provider.model = val;
        }
        if let Some(val) = env.var(constants::ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }

        // Provider-specific API key resolution
        let api_key = env.first_of(&[constants::ENV_API_KEY, self.provider.name.api_key_env_var()]);
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }

        if let Some(val) = env.var(constants::ENV_GITHUB_API) {
            self.github.api_base = val;
        }
        let token = env.first_of(&[constants::ENV_GITHUB_TOKEN, constants::ENV_GITHUB_TOKEN_FALLBACK]);
        if token.is_some() {
            self.github.token = token;
        }

        if let Some(val) = env.var(constants::ENV_CACHE_BACKEND) {
            match val.parse::<CacheBackend>() {
                Ok(backend) => self.cache.backend = backend,
                Err(_) => tracing::warn!(variable = constants::ENV_CACHE_BACKEND, value = %val, "ignoring invalid cache backend"),
            }
        }
        if let Some(val) = env.var(constants::ENV_CACHE_TTL) {
            match val.trim().parse::<u64>().ok().and_then(valid_ttl) {
                Some(secs) => self.cache.ttl_secs = secs,
                None => tracing::warn!(variable = constants::ENV_CACHE_TTL, value = %val, "ignoring invalid cache TTL"),
            }
        }
        if let Some(val) = env.var(constants::ENV_REDIS_URL) {
            self.cache.redis_url = Some(val);
        }

        if let Some(val) = env.var(constants::ENV_STACKEXCHANGE_KEY) {
            self.enrichment.key = Some(val);
        }
        if let Some(enabled) = env.flag(constants::ENV_ENRICHMENT) {
            self.enrichment.enabled = enabled;
        }
    }
}

/// Zero is rejected; anything past the maximum is clamped to it.
fn valid_ttl(secs: u64) -> Option<u64> {
    let max = constants::MAX_CACHE_TTL.as_secs();
    match secs {
        0 => {
            tracing::warn!("ignoring cache ttl_secs = 0");
            None
        }
        secs if secs > max => {
            tracing::warn!(ttl_secs = secs, max, "clamping cache TTL");
            Some(max)
        }
        secs => Some(secs),
    }
}
