//! Shopfront REST API client.
//!
//! # Architecture
//!
//! - One [`ApiClient`] per process, cheap to clone (`Arc` inside)
//! - Bearer token read from [`SessionState`] on every authenticated request
//! - A `401` on an authenticated request clears the session it was sent under
//! - Catalog reads cached in memory via `moka`; cart and orders never are
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopfront_client::{ApiClient, SessionState};
//!
//! let session = Arc::new(SessionState::in_memory());
//! let api = ApiClient::new(&config.api, Arc::clone(&session))?;
//!
//! let page = api.list_products(&ProductQuery::default()).await?;
//! ```

mod auth;
mod cache;
mod cart;
mod catalog;
mod orders;

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::session::SessionState;

use cache::{CacheKey, CacheValue};

const CACHE_CAPACITY: u64 = 1000;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint path did not form a valid URL.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    /// An authenticated endpoint was called without a session.
    #[error("Not signed in")]
    MissingToken,

    /// The backend rejected the session token.
    #[error("Session rejected by the server")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("Server returned {status}{}", format_message(.message))]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ApiError {
    /// Human-readable message supplied by the backend, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            Self::NotFound(message) => Some(message),
            _ => None,
        }
    }

    /// Whether the request never produced a response.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

fn format_message(message: &Option<String>) -> String {
    message
        .as_deref()
        .map_or_else(String::new, |m| format!(": {m}"))
}

/// Extract `{"error": ...}` or `{"message": ...}` from an error body.
fn error_message(body: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<String>,
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .filter(|m| !m.trim().is_empty())
}

/// Whether a request needs the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Authenticated,
}

/// A request bound to the session epoch it was issued under.
struct Prepared {
    request: RequestBuilder,
    access: Access,
    epoch: u64,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Shopfront REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    config: ApiConfig,
    session: Arc<SessionState>,
    cache: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a client for the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, session: Arc<SessionState>) -> Result<Self, ApiError> {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("shopfront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                config: config.clone(),
                session,
                cache,
            }),
        })
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionState> {
        &self.inner.session
    }

    /// Settings the client was built with.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Check that the backend is up.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or unhealthy.
    pub async fn health(&self) -> Result<(), ApiError> {
        self.send_unit(Method::GET, "/health", Access::Public).await
    }

    // =========================================================================
    // Request Plumbing
    // =========================================================================

    fn prepare(&self, method: Method, path: &str, access: Access) -> Result<Prepared, ApiError> {
        let url = self.inner.config.endpoint(path)?;
        let (session, epoch) = self.inner.session.snapshot();

        let mut request = self.inner.client.request(method, url);
        if access == Access::Authenticated {
            let session = session.ok_or(ApiError::MissingToken)?;
            request = request.bearer_auth(session.token().expose_secret());
        }

        Ok(Prepared {
            request,
            access,
            epoch,
        })
    }

    /// Send a request and return the body of a successful response.
    async fn execute(&self, prepared: Prepared) -> Result<String, ApiError> {
        let Prepared {
            request,
            access,
            epoch,
        } = prepared;

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body);

        if status == StatusCode::UNAUTHORIZED && access == Access::Authenticated {
            self.inner.session.invalidate(epoch);
            return Err(ApiError::Unauthorized);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(
                message.unwrap_or_else(|| "resource not found".to_string()),
            ));
        }

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned server error"
            );
        } else {
            tracing::debug!(status = %status, message = ?message, "Backend rejected request");
        }

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        access: Access,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut prepared = self.prepare(Method::GET, path, access)?;
        if !query.is_empty() {
            prepared.request = prepared.request.query(query);
        }
        let body = self.execute(prepared).await?;
        parse(&body)
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        access: Access,
        payload: &B,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut prepared = self.prepare(method, path, access)?;
        prepared.request = prepared.request.json(payload);
        let body = self.execute(prepared).await?;
        parse(&body)
    }

    /// Send a bodyless request whose response body is not needed.
    async fn send_unit(&self, method: Method, path: &str, access: Access) -> Result<(), ApiError> {
        let prepared = self.prepare(method, path, access)?;
        self.execute(prepared).await?;
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse backend response"
        );
        ApiError::Parse(e)
    })
}
