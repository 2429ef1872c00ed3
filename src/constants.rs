//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and upstream URLs so a rename only requires changing this file.

use std::time::Duration;

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "repoprobe";

/// Crate version baked in at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` sent to GitHub and Stack Exchange (both reject anonymous agents).
pub const USER_AGENT: &str = concat!("repoprobe/", env!("CARGO_PKG_VERSION"));

/// Local config filename (e.g. `.repoprobe.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".repoprobe.toml";

/// Directory name under `~/.config/` for global config and cache.
pub const CONFIG_DIR: &str = "repoprobe";

/// Default GitHub REST API base.
pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// GitHub REST API version header value.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Default Stack Exchange API base.
pub const STACKEXCHANGE_API_BASE: &str = "https://api.stackexchange.com/2.3";

/// Lifetime of every cache entry unless configured otherwise.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a configured cache TTL.
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Limit on a single cache backend call; a slower backend counts as a miss.
pub const CACHE_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Key prefix for entries written to Redis.
pub const REDIS_KEY_PREFIX: &str = "repoprobe";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "REPOPROBE_PROVIDER";
pub const ENV_MODEL: &str = "REPOPROBE_MODEL";
pub const ENV_API_KEY: &str = "REPOPROBE_API_KEY";
pub const ENV_BASE_URL: &str = "REPOPROBE_BASE_URL";
pub const ENV_GITHUB_API: &str = "REPOPROBE_GITHUB_API";
pub const ENV_GITHUB_TOKEN: &str = "REPOPROBE_GITHUB_TOKEN";
pub const ENV_GITHUB_TOKEN_FALLBACK: &str = "GITHUB_TOKEN";
pub const ENV_CACHE_BACKEND: &str = "REPOPROBE_CACHE_BACKEND";
pub const ENV_CACHE_TTL: &str = "REPOPROBE_CACHE_TTL";
pub const ENV_REDIS_URL: &str = "REPOPROBE_REDIS_URL";
pub const ENV_STACKEXCHANGE_KEY: &str = "REPOPROBE_STACKEXCHANGE_KEY";
pub const ENV_ENRICHMENT: &str = "REPOPROBE_ENRICHMENT";
pub const ENV_LOG: &str = "REPOPROBE_LOG";
