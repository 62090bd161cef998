//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional:
//! - `KREG_API_URL` - Base URL of the storefront API (default: the hosted backend)
//! - `KREG_DATA_DIR` - Directory for the persisted cart mirror and session (default: `.kreg`)
//! - `KREG_SEARCH_DEBOUNCE_MS` - Quiet interval before a search runs (default: 300)
//! - `KREG_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 15)
//! - `KREG_PRODUCT_CACHE_TTL_SECS` - TTL of the product-by-id cache (default: 300)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Hosted backend used when `KREG_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "https://krego-market-back.vercel.app/api";

const DEFAULT_DATA_DIR: &str = ".kreg";
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote API (cart, catalog and auth endpoints hang off it)
    pub api_url: Url,
    /// Directory holding the persisted cart mirror and session
    pub data_dir: PathBuf,
    /// Quiet interval a query must settle for before the filter runs
    pub search_debounce: Duration,
    /// Timeout applied to every remote call
    pub http_timeout: Duration,
    /// How long a product fetched by id stays cached
    pub product_cache_ttl: Duration,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the API URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            product_cache_ttl: Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup("KREG_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&raw_url)?;

        let data_dir = lookup("KREG_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);

        let search_debounce = Duration::from_millis(parse_u64(
            &lookup,
            "KREG_SEARCH_DEBOUNCE_MS",
            DEFAULT_SEARCH_DEBOUNCE_MS,
        )?);
        let http_timeout = Duration::from_secs(parse_u64(
            &lookup,
            "KREG_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?);
        if http_timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "KREG_HTTP_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let product_cache_ttl = Duration::from_secs(parse_u64(
            &lookup,
            "KREG_PRODUCT_CACHE_TTL_SECS",
            DEFAULT_PRODUCT_CACHE_TTL_SECS,
        )?);

        Ok(Self {
            api_url,
            data_dir,
            search_debounce,
            http_timeout,
            product_cache_ttl,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the API base URL; only http(s) URLs are accepted.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("KREG_API_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "KREG_API_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Get a numeric variable with a default value.
fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    lookup(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
