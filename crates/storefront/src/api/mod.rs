//! Remote cart, catalog and auth services.
//!
//! # Architecture
//!
//! - Each remote service is a trait ([`CartApi`], [`CatalogApi`], [`AuthApi`])
//!   so the synchronizer can be driven by the HTTP client or by an in-memory
//!   fake in tests
//! - [`HttpApi`] implements all three over `reqwest`
//! - The server is the source of truth for carts: these adapters never
//!   cache cart responses. Products fetched by id are cached via `moka`
//!
//! # Endpoints
//!
//! - `GET /cart`, `POST /cart/add`, `PUT /cart/update`,
//!   `DELETE /cart/remove/{id}`, `DELETE /cart/clear` (bearer token)
//! - `GET /product/all`, `GET /product/{id}`
//! - `POST /user/Login`, `POST /user/Register`

mod client;
pub mod types;

use std::future::Future;

use kreg_core::{Cart, Email, Product, ProductId, UserProfile};
use reqwest::StatusCode;
use secrecy::SecretString;
use thiserror::Error;

pub use client::HttpApi;

/// Message fragments the backend uses when it refuses a session token.
///
/// Matched case-insensitively against the `message` of a `success: false`
/// payload; the backend answers some of these with HTTP 200.
const DEAUTHORIZED_PATTERNS: &[&str] = &[
    "not authorized",
    "unauthorized",
    "invalid token",
    "token expired",
    "jwt expired",
    "jwt malformed",
    "login again",
];

/// Errors that can occur when talking to the remote services.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-success HTTP status without a usable payload.
    #[error("HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// Server answered `success: false`.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Server refused the session token.
    #[error("Deauthorized: {0}")]
    Deauthorized(String),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The configured API URL cannot have endpoint paths appended.
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Whether a server message means the session token is dead.
#[must_use]
pub fn is_deauthorization_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    DEAUTHORIZED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Result of a successful login or registration call.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    /// Session token; registration may succeed without one.
    pub token: Option<SecretString>,
    pub user: Option<UserProfile>,
}

/// Server-side cart of the authenticated user.
pub trait CartApi: Send + Sync {
    /// Fetch the cart of record.
    fn fetch_cart(
        &self,
        token: &SecretString,
    ) -> impl Future<Output = Result<Cart, ApiError>> + Send;

    /// Add one unit of a product.
    fn add_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Set the quantity of a line. The value is passed through unchanged.
    fn update_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: i64,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove a line.
    fn remove_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove every line.
    fn clear_cart(&self, token: &SecretString)
    -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Product catalog.
pub trait CatalogApi: Send + Sync {
    /// Fetch the full catalog.
    fn fetch_products(&self) -> impl Future<Output = Result<Vec<Product>, ApiError>> + Send;

    /// Fetch a single product.
    fn fetch_product(
        &self,
        product_id: &ProductId,
    ) -> impl Future<Output = Result<Product, ApiError>> + Send;
}

/// Account login and registration.
pub trait AuthApi: Send + Sync {
    fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;

    fn register(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> impl Future<Output = Result<AuthGrant, ApiError>> + Send;
}

/// Everything the synchronizer needs from the remote side.
pub trait Backend: CartApi + CatalogApi + AuthApi {}

impl<T: CartApi + CatalogApi + AuthApi> Backend for T {}
