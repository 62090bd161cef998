//! Integration tests for Kreg Market.
//!
//! Provides [`MockBackend`], an in-process stand-in for the remote storefront
//! API served by `axum` on an ephemeral port. Tests in `tests/` point the real
//! `reqwest` adapters at it and drive them through the synchronizer.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kreg-integration-tests
//! ```
//!
//! # Wire behavior
//!
//! - Missing or unknown bearer token: HTTP 401
//! - Revoked token: HTTP 200 with `success: false` and a "jwt expired" message
//! - Out-of-stock add: HTTP 200 with `success: false`
//! - Update with quantity 0 or below deletes the line
//! - Registration never issues a token; a separate login is required

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::header::{AUTHORIZATION, RETRY_AFTER};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

// =============================================================================
// State
// =============================================================================

/// Handle to a running mock server. Clones share state with the server.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    addr: SocketAddr,
}

#[derive(Default)]
struct MockState {
    products: Vec<MockProduct>,
    users: HashMap<String, MockUser>,
    /// Cart lines keyed by token; a token is valid iff it has an entry.
    carts: HashMap<String, Vec<(String, i64)>>,
    revoked: HashSet<String>,
    /// Status to answer the next request with, before any routing logic.
    fail_next: Option<StatusCode>,
    product_hits: HashMap<String, usize>,
    cart_reads: usize,
}

struct MockProduct {
    id: String,
    name: String,
    description: String,
    category: String,
    subcategory: Option<String>,
    price: f64,
    out_of_stock: bool,
}

struct MockUser {
    id: String,
    name: String,
    password: String,
    token: String,
}

impl MockProduct {
    fn to_json(&self) -> Value {
        let mut value = json!({
            "_id": self.id,
            "name": self.name,
            "description": self.description,
            "category": self.category,
            "price": self.price,
            "image": format!("https://img.example/{}.png", self.id),
            "outOfStock": self.out_of_stock,
        });
        if let (Some(sub), Some(obj)) = (&self.subcategory, value.as_object_mut()) {
            obj.insert("subcategory".to_string(), json!(sub));
        }
        value
    }
}

impl MockBackend {
    /// Start the server on `127.0.0.1` with an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let state = Arc::new(Mutex::new(MockState::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let app = Router::new().nest("/api", routes()).with_state(Arc::clone(&state));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Mock backend stopped");
            }
        });

        Ok(Self { state, addr })
    }

    /// Base URL to configure the client with.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a product to the catalog.
    pub fn add_product(
        &self,
        id: &str,
        name: &str,
        category: &str,
        subcategory: Option<&str>,
        price: f64,
    ) -> &Self {
        self.lock().products.push(MockProduct {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{name} from the market"),
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            price,
            out_of_stock: false,
        });
        self
    }

    /// Mark a product out of stock.
    pub fn set_out_of_stock(&self, id: &str) {
        if let Some(product) = self.lock().products.iter_mut().find(|p| p.id == id) {
            product.out_of_stock = true;
        }
    }

    /// Create an account with a fixed token.
    pub fn add_user(&self, name: &str, email: &str, password: &str, token: &str) -> &Self {
        let mut state = self.lock();
        let id = format!("u{}", state.users.len() + 1);
        state.users.insert(
            email.to_string(),
            MockUser {
                id,
                name: name.to_string(),
                password: password.to_string(),
                token: token.to_string(),
            },
        );
        state.carts.entry(token.to_string()).or_default();
        drop(state);
        self
    }

    /// Replace the cart behind a token.
    pub fn set_cart(&self, token: &str, lines: &[(&str, i64)]) {
        self.lock().carts.insert(
            token.to_string(),
            lines.iter().map(|(id, q)| ((*id).to_string(), *q)).collect(),
        );
    }

    /// Current cart lines behind a token.
    #[must_use]
    pub fn cart(&self, token: &str) -> Vec<(String, i64)> {
        self.lock().carts.get(token).cloned().unwrap_or_default()
    }

    /// Make the token fail with a `success: false` "jwt expired" reply.
    pub fn revoke(&self, token: &str) {
        self.lock().revoked.insert(token.to_string());
    }

    /// Answer the next request with `status`.
    pub fn fail_next(&self, status: StatusCode) {
        self.lock().fail_next = Some(status);
    }

    /// How many times `GET /product/{id}` was served for `id`.
    #[must_use]
    pub fn product_hits(&self, id: &str) -> usize {
        self.lock().product_hits.get(id).copied().unwrap_or(0)
    }

    /// How many times `GET /cart` was served.
    #[must_use]
    pub fn cart_reads(&self) -> usize {
        self.lock().cart_reads
    }
}

// =============================================================================
// Routes
// =============================================================================

type Shared = Arc<Mutex<MockState>>;

fn routes() -> Router<Shared> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/add", post(add_item))
        .route("/cart/update", put(update_item))
        .route("/cart/remove/{id}", delete(remove_item))
        .route("/cart/clear", delete(clear_cart))
        .route("/product/all", get(all_products))
        .route("/product/{id}", get(one_product))
        .route("/user/Login", post(login))
        .route("/user/Register", post(register))
}

fn state(shared: &Shared) -> MutexGuard<'_, MockState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn refuse(message: &str) -> Response {
    reply(StatusCode::OK, json!({ "success": false, "message": message }))
}

fn ok() -> Response {
    reply(StatusCode::OK, json!({ "success": true }))
}

impl MockState {
    fn injected_failure(&mut self) -> Option<Response> {
        let status = self.fail_next.take()?;
        let mut response = reply(status, json!({ "success": false, "message": "injected failure" }));
        if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(RETRY_AFTER, axum::http::HeaderValue::from_static("7"));
        }
        Some(response)
    }

    /// Resolve the bearer token to a cart, or the response refusing it.
    fn cart_for(&mut self, headers: &HeaderMap) -> Result<&mut Vec<(String, i64)>, Response> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                reply(
                    StatusCode::UNAUTHORIZED,
                    json!({ "success": false, "message": "Not authorized, no token" }),
                )
            })?;
        if self.revoked.contains(token) {
            return Err(refuse("jwt expired"));
        }
        self.carts.get_mut(token).ok_or_else(|| {
            reply(
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "message": "Not authorized, token failed" }),
            )
        })
    }

    fn price_of(&self, id: &str) -> f64 {
        self.products
            .iter()
            .find(|p| p.id == id)
            .map_or(0.0, |p| p.price)
    }
}

async fn get_cart(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    state.cart_reads += 1;
    let lines = match state.cart_for(&headers) {
        Ok(lines) => lines.clone(),
        Err(refusal) => return refusal,
    };

    #[allow(clippy::cast_precision_loss)]
    let total: f64 = lines
        .iter()
        .map(|(id, q)| state.price_of(id) * *q as f64)
        .sum();
    let count: i64 = lines.iter().map(|(_, q)| q).sum();
    let items: Vec<Value> = lines
        .iter()
        .map(|(id, q)| json!({ "productId": id, "quantity": q }))
        .collect();

    reply(
        StatusCode::OK,
        json!({
            "success": true,
            "cartItems": items,
            "totalAmount": total,
            "itemCount": count,
        }),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody {
    item_id: String,
    #[serde(default)]
    quantity: i64,
}

async fn add_item(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<ItemBody>,
) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    let stocked = match state.products.iter().find(|p| p.id == body.item_id) {
        Some(product) => !product.out_of_stock,
        None => {
            return reply(
                StatusCode::NOT_FOUND,
                json!({ "success": false, "message": "Product not found" }),
            );
        }
    };
    let lines = match state.cart_for(&headers) {
        Ok(lines) => lines,
        Err(refusal) => return refusal,
    };
    if !stocked {
        return refuse("Product is out of stock");
    }
    match lines.iter_mut().find(|(id, _)| *id == body.item_id) {
        Some((_, quantity)) => *quantity += 1,
        None => lines.push((body.item_id, 1)),
    }
    reply(
        StatusCode::OK,
        json!({ "success": true, "message": "Item added to cart" }),
    )
}

async fn update_item(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<ItemBody>,
) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    let lines = match state.cart_for(&headers) {
        Ok(lines) => lines,
        Err(refusal) => return refusal,
    };
    let Some(index) = lines.iter().position(|(id, _)| *id == body.item_id) else {
        return refuse("Item not in cart");
    };
    if body.quantity <= 0 {
        lines.remove(index);
    } else if let Some(line) = lines.get_mut(index) {
        line.1 = body.quantity;
    }
    ok()
}

async fn remove_item(
    State(shared): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    match state.cart_for(&headers) {
        Ok(lines) => {
            lines.retain(|(line_id, _)| *line_id != id);
            ok()
        }
        Err(refusal) => refusal,
    }
}

async fn clear_cart(State(shared): State<Shared>, headers: HeaderMap) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    match state.cart_for(&headers) {
        Ok(lines) => {
            lines.clear();
            ok()
        }
        Err(refusal) => refusal,
    }
}

async fn all_products(State(shared): State<Shared>) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    let products: Vec<Value> = state.products.iter().map(MockProduct::to_json).collect();
    reply(
        StatusCode::OK,
        json!({ "success": true, "products": products }),
    )
}

async fn one_product(State(shared): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    *state.product_hits.entry(id.clone()).or_default() += 1;
    match state.products.iter().find(|p| p.id == id) {
        Some(product) => reply(
            StatusCode::OK,
            json!({ "success": true, "product": product.to_json() }),
        ),
        None => refuse("Product not found"),
    }
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    name: Option<String>,
    email: String,
    password: String,
}

async fn login(State(shared): State<Shared>, Json(body): Json<Credentials>) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    match state.users.get(&body.email) {
        Some(user) if user.password == body.password => reply(
            StatusCode::OK,
            json!({
                "success": true,
                "token": user.token,
                "user": { "_id": user.id, "name": user.name, "email": body.email },
            }),
        ),
        _ => reply(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "message": "Invalid email or password" }),
        ),
    }
}

async fn register(State(shared): State<Shared>, Json(body): Json<Credentials>) -> Response {
    let mut state = state(&shared);
    if let Some(failure) = state.injected_failure() {
        return failure;
    }
    if state.users.contains_key(&body.email) {
        return refuse("User already exists");
    }
    let id = format!("u{}", state.users.len() + 1);
    let token = format!("token-{id}");
    state.carts.insert(token.clone(), Vec::new());
    state.users.insert(
        body.email,
        MockUser {
            id,
            name: body.name.unwrap_or_default(),
            password: body.password,
            token,
        },
    );
    reply(
        StatusCode::CREATED,
        json!({ "success": true, "message": "User registered successfully" }),
    )
}
