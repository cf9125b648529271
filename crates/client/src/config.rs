//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPFRONT_API_URL` - Base URL of the storefront backend (e.g. `http://localhost:8080`)
//!
//! ## Optional
//! - `SHOPFRONT_API_PREFIX` - Path prefix for all endpoints (default: `/api/v1`)
//! - `SHOPFRONT_SESSION_DIR` - Directory holding the persisted session (default: `.shopfront`)
//! - `SHOPFRONT_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SHOPFRONT_CATALOG_CACHE_TTL_SECS` - Product/category cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_SESSION_DIR: &str = ".shopfront";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Shopfront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend REST API settings
    pub api: ApiConfig,
    /// Where the session is persisted between runs
    pub session_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Backend REST API settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend base URL (scheme + host + port)
    pub base_url: Url,
    /// Path prefix shared by every endpoint
    pub prefix: String,
    /// Per-request timeout; a hung request surfaces as a network error
    pub request_timeout: Duration,
    /// Lifetime of cached catalog reads
    pub catalog_cache_ttl: Duration,
}

impl ApiConfig {
    /// Settings pointing at `base_url` with every other value at its default.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
        }
    }

    /// Full URL of an endpoint path such as `/cart/item/3`.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined path is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        let prefix = self.prefix.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        self.base_url.join(&format!("{prefix}/{path}"))
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = ApiConfig::from_env()?;
        let session_dir = PathBuf::from(get_env_or_default(
            "SHOPFRONT_SESSION_DIR",
            DEFAULT_SESSION_DIR,
        ));

        Ok(Self {
            api,
            session_dir,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_url = get_required_env("SHOPFRONT_API_URL")?;
        let base_url = parse_base_url(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPFRONT_API_URL".to_string(), e))?;

        let prefix = normalize_prefix(&get_env_or_default(
            "SHOPFRONT_API_PREFIX",
            DEFAULT_API_PREFIX,
        ));

        Ok(Self {
            base_url,
            prefix,
            request_timeout: get_duration_secs(
                "SHOPFRONT_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            catalog_cache_ttl: get_duration_secs(
                "SHOPFRONT_CATALOG_CACHE_TTL_SECS",
                DEFAULT_CATALOG_CACHE_TTL_SECS,
            )?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a whole number of seconds, rejecting zero.
fn get_duration_secs(key: &str, default: u64) -> Result<Duration, ConfigError> {
    let secs = get_env_or_default(key, &default.to_string())
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if secs == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_secs(secs))
}

/// Parse and validate the backend base URL.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("must have a host".to_string());
    }
    Ok(url)
}

/// Ensure the prefix has exactly one leading slash and no trailing slash.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_rejects_other_schemes() {
        assert!(parse_base_url("http://localhost:8080").is_ok());
        assert!(parse_base_url("https://shop.example.com").is_ok());
        assert!(parse_base_url("ftp://shop.example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("api/v1/"), "/api/v1");
        assert_eq!(normalize_prefix("/api"), "/api");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn test_endpoint_joins_prefix_and_path() {
        let config = ApiConfig::new(Url::parse("http://localhost:8080").unwrap());
        assert_eq!(
            config.endpoint("/cart/item/3").unwrap().as_str(),
            "http://localhost:8080/api/v1/cart/item/3"
        );

        let bare = ApiConfig {
            prefix: String::new(),
            ..config
        };
        assert_eq!(
            bare.endpoint("cart").unwrap().as_str(),
            "http://localhost:8080/cart"
        );
    }

    #[test]
    fn test_endpoint_ignores_base_path() {
        // Absolute join replaces any path on the base URL.
        let config = ApiConfig::new(Url::parse("http://localhost:8080/ignored/").unwrap());
        assert_eq!(
            config.endpoint("products").unwrap().as_str(),
            "http://localhost:8080/api/v1/products"
        );
    }
}
