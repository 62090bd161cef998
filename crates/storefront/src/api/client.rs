//! HTTP implementation of the remote services.
//!
//! Uses `reqwest` with a per-request timeout. Products fetched by id are
//! cached using `moka`; carts are never cached.

use std::sync::Arc;

use kreg_core::{Cart, Email, Product, ProductId};
use moka::future::Cache;
use reqwest::{RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::types::{
    Ack, AddItemRequest, AuthPayload, CartPayload, CredentialsRequest, ProductPayload,
    ProductsPayload, Status, UpdateItemRequest,
};
use super::{ApiError, AuthApi, AuthGrant, CartApi, CatalogApi, is_deauthorization_message};
use crate::config::ClientConfig;

const MAX_CACHED_PRODUCTS: u64 = 1000;
const ERROR_BODY_PREVIEW: usize = 200;

// =============================================================================
// HttpApi
// =============================================================================

/// Client for the storefront's REST API.
///
/// Cheaply cloneable; clones share the connection pool and product cache.
#[derive(Clone)]
pub struct HttpApi {
    inner: Arc<HttpApiInner>,
}

struct HttpApiInner {
    client: reqwest::Client,
    base_url: Url,
    products: Cache<ProductId, Product>,
}

impl HttpApi {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built or the
    /// configured URL cannot carry a path.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        if config.api_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(config.api_url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let products = Cache::builder()
            .max_capacity(MAX_CACHED_PRODUCTS)
            .time_to_live(config.product_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(HttpApiInner {
                client,
                base_url: config.api_url.clone(),
                products,
            }),
        })
    }

    /// Endpoint under the base URL.
    ///
    /// Segments are percent-encoded one by one, so an id holding `/`, `?`
    /// or `#` stays a single segment. `.` and `..` would be dropped by URL
    /// normalization and are refused.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(dots) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(ApiError::NotFound((*dots).to_string()));
        }
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode its payload.
    ///
    /// A `success: false` payload becomes `Rejected`, or `Deauthorized` when
    /// the message says the token is dead. HTTP 401/403 are always
    /// `Deauthorized`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;
        let header = serde_json::from_str::<Status>(&body);
        let message = header.as_ref().ok().and_then(|h| h.message.clone());

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(ApiError::Deauthorized(
                message.unwrap_or_else(|| "session expired, please log in again".to_string()),
            ));
        }

        if !status.is_success() {
            let message = message.unwrap_or_else(|| preview(&body));
            if is_deauthorization_message(&message) {
                return Err(ApiError::Deauthorized(message));
            }
            if status == StatusCode::NOT_FOUND {
                return Err(ApiError::NotFound(message));
            }
            tracing::warn!(status = %status, message = %message, "API returned non-success status");
            return Err(ApiError::Status { status, message });
        }

        let header = header.map_err(|e| {
            tracing::error!(error = %e, body = %preview(&body), "Failed to parse API response");
            ApiError::Parse(e)
        })?;

        if !header.success {
            let message = message.unwrap_or_else(|| "request was rejected".to_string());
            return Err(if is_deauthorization_message(&message) {
                ApiError::Deauthorized(message)
            } else {
                ApiError::Rejected(message)
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, body = %preview(&body), "Failed to decode API payload");
            ApiError::Parse(e)
        })
    }

    async fn grant(&self, request: RequestBuilder) -> Result<AuthGrant, ApiError> {
        let payload: AuthPayload = self.send(request).await?;
        Ok(AuthGrant {
            token: payload
                .token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            user: payload.user,
        })
    }
}

fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}

// =============================================================================
// Cart
// =============================================================================

impl CartApi for HttpApi {
    #[instrument(skip(self, token))]
    async fn fetch_cart(&self, token: &SecretString) -> Result<Cart, ApiError> {
        let request = self
            .inner
            .client
            .get(self.url(&["cart"])?)
            .bearer_auth(token.expose_secret());
        let payload: CartPayload = self.send(request).await?;
        Ok(payload.into_cart())
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn add_item(&self, token: &SecretString, product_id: &ProductId) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .post(self.url(&["cart", "add"])?)
            .bearer_auth(token.expose_secret())
            .json(&AddItemRequest {
                item_id: product_id,
            });
        let _: Ack = self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn update_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .put(self.url(&["cart", "update"])?)
            .bearer_auth(token.expose_secret())
            .json(&UpdateItemRequest {
                item_id: product_id,
                quantity,
            });
        let _: Ack = self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn remove_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.url(&["cart", "remove", product_id.as_str()])?)
            .bearer_auth(token.expose_secret());
        let _: Ack = self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn clear_cart(&self, token: &SecretString) -> Result<(), ApiError> {
        let request = self
            .inner
            .client
            .delete(self.url(&["cart", "clear"])?)
            .bearer_auth(token.expose_secret());
        let _: Ack = self.send(request).await?;
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

impl CatalogApi for HttpApi {
    #[instrument(skip(self))]
    async fn fetch_products(&self) -> Result<Vec<Product>, ApiError> {
        let request = self.inner.client.get(self.url(&["product", "all"])?);
        let payload: ProductsPayload = self.send(request).await?;
        debug!(count = payload.products.len(), "Fetched catalog");
        Ok(payload.products)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn fetch_product(&self, product_id: &ProductId) -> Result<Product, ApiError> {
        if let Some(product) = self.inner.products.get(product_id).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let request = self
            .inner
            .client
            .get(self.url(&["product", product_id.as_str()])?);
        let payload: ProductPayload = match self.send(request).await {
            Ok(payload) => payload,
            Err(ApiError::Rejected(_)) => return Err(ApiError::NotFound(product_id.to_string())),
            Err(e) => return Err(e),
        };
        let product = payload
            .product
            .ok_or_else(|| ApiError::NotFound(product_id.to_string()))?;

        self.inner
            .products
            .insert(product_id.clone(), product.clone())
            .await;

        Ok(product)
    }
}

// =============================================================================
// Auth
// =============================================================================

impl AuthApi for HttpApi {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(&self, email: &Email, password: &SecretString) -> Result<AuthGrant, ApiError> {
        let request = self
            .inner
            .client
            .post(self.url(&["user", "Login"])?)
            .json(&CredentialsRequest {
                name: None,
                email: email.as_str(),
                password: password.expose_secret(),
            });
        self.grant(request).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn register(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthGrant, ApiError> {
        let request = self
            .inner
            .client
            .post(self.url(&["user", "Register"])?)
            .json(&CredentialsRequest {
                name: Some(name),
                email: email.as_str(),
                password: password.expose_secret(),
            });
        self.grant(request).await
    }
}
