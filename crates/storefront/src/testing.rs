//! In-memory remote services for synchronizer tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use kreg_core::{Cart, Email, Product, ProductId, UserProfile};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::oneshot;

use crate::api::{ApiError, AuthApi, AuthGrant, CartApi, CatalogApi};

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    products: Vec<Product>,
    /// Cart lines keyed by session token. A token is valid iff it has an entry.
    carts: HashMap<String, Vec<(ProductId, i64)>>,
    accounts: HashMap<String, Account>,
    revoked: HashSet<String>,
    offline: bool,
    reject_next: Option<String>,
    register_without_token: bool,
    gates: VecDeque<oneshot::Receiver<()>>,
    login_gate: Option<oneshot::Receiver<()>>,
    cart_fetches: usize,
    mutations: usize,
}

struct Account {
    password: String,
    token: String,
    profile: UserProfile,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_products(self, products: Vec<Product>) -> Self {
        self.state().products = products;
        self
    }

    pub fn with_account(self, name: &str, email: &str, password: &str, token: &str) -> Self {
        {
            let mut state = self.state();
            state.accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    token: token.to_string(),
                    profile: UserProfile {
                        id: None,
                        name: name.to_string(),
                        email: email.to_string(),
                    },
                },
            );
            state.carts.entry(token.to_string()).or_default();
        }
        self
    }

    pub fn with_cart(self, token: &str, lines: &[(&str, i64)]) -> Self {
        self.state().carts.insert(
            token.to_string(),
            lines.iter().map(|(id, q)| (ProductId::new(*id), *q)).collect(),
        );
        self
    }

    pub fn revoke(&self, token: &str) {
        self.state().revoked.insert(token.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn reject_next(&self, message: &str) {
        self.state().reject_next = Some(message.to_string());
    }

    pub fn register_without_token(&self) {
        self.state().register_without_token = true;
    }

    /// Hold the next cart fetch until the returned sender fires.
    ///
    /// The outcome, cart or error, is decided when the request arrives, not
    /// when it is released.
    pub fn gate_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state().gates.push_back(rx);
        tx
    }

    /// Hold the next login until the returned sender fires or is dropped.
    pub fn gate_next_login(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state().login_gate = Some(rx);
        tx
    }

    pub fn cart_fetches(&self) -> usize {
        self.state().cart_fetches
    }

    pub fn mutations(&self) -> usize {
        self.state().mutations
    }

    pub fn server_cart(&self, token: &str) -> Vec<(ProductId, i64)> {
        self.state().carts.get(token).cloned().unwrap_or_default()
    }

    pub fn set_server_cart(&self, token: &str, lines: &[(&str, i64)]) {
        self.state().carts.insert(
            token.to_string(),
            lines.iter().map(|(id, q)| (ProductId::new(*id), *q)).collect(),
        );
    }
}

impl FakeState {
    fn check_reachable(&mut self) -> Result<(), ApiError> {
        if self.offline {
            return Err(ApiError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "offline".to_string(),
            });
        }
        if let Some(message) = self.reject_next.take() {
            return Err(ApiError::Rejected(message));
        }
        Ok(())
    }

    fn lines(&mut self, token: &SecretString) -> Result<&mut Vec<(ProductId, i64)>, ApiError> {
        self.check_reachable()?;
        let token = token.expose_secret();
        if self.revoked.contains(token) {
            return Err(ApiError::Deauthorized("jwt expired".to_string()));
        }
        self.carts
            .get_mut(token)
            .ok_or_else(|| ApiError::Deauthorized("Not authorized, login again".to_string()))
    }

    fn price_of(&self, product_id: &ProductId) -> Decimal {
        self.products
            .iter()
            .find(|p| &p.id == product_id)
            .map_or(Decimal::ZERO, |p| p.price)
    }

    fn cart_of(&self, lines: &[(ProductId, i64)]) -> Cart {
        let total = lines
            .iter()
            .map(|(id, q)| self.price_of(id) * Decimal::from(*q))
            .sum();
        Cart::from_server(lines.iter().cloned(), total)
    }
}

impl CartApi for FakeBackend {
    async fn fetch_cart(&self, token: &SecretString) -> Result<Cart, ApiError> {
        let (outcome, gate) = {
            let mut state = self.state();
            state.cart_fetches += 1;
            let gate = state.gates.pop_front();
            let outcome = state
                .lines(token)
                .cloned()
                .map(|lines| state.cart_of(&lines));
            (outcome, gate)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        outcome
    }

    async fn add_item(&self, token: &SecretString, product_id: &ProductId) -> Result<(), ApiError> {
        let mut state = self.state();
        let lines = state.lines(token)?;
        match lines.iter_mut().find(|(id, _)| id == product_id) {
            Some((_, quantity)) => *quantity += 1,
            None => lines.push((product_id.clone(), 1)),
        }
        state.mutations += 1;
        Ok(())
    }

    async fn update_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<(), ApiError> {
        let mut state = self.state();
        let lines = state.lines(token)?;
        let Some(index) = lines.iter().position(|(id, _)| id == product_id) else {
            return Err(ApiError::Rejected("Item not in cart".to_string()));
        };
        if quantity <= 0 {
            lines.remove(index);
        } else {
            lines[index].1 = quantity;
        }
        state.mutations += 1;
        Ok(())
    }

    async fn remove_item(
        &self,
        token: &SecretString,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let mut state = self.state();
        state.lines(token)?.retain(|(id, _)| id != product_id);
        state.mutations += 1;
        Ok(())
    }

    async fn clear_cart(&self, token: &SecretString) -> Result<(), ApiError> {
        let mut state = self.state();
        state.lines(token)?.clear();
        state.mutations += 1;
        Ok(())
    }
}

impl CatalogApi for FakeBackend {
    async fn fetch_products(&self) -> Result<Vec<Product>, ApiError> {
        let mut state = self.state();
        state.check_reachable()?;
        Ok(state.products.clone())
    }

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Product, ApiError> {
        let mut state = self.state();
        state.check_reachable()?;
        state
            .products
            .iter()
            .find(|p| &p.id == product_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(product_id.to_string()))
    }
}

impl AuthApi for FakeBackend {
    async fn login(&self, email: &Email, password: &SecretString) -> Result<AuthGrant, ApiError> {
        let gate = self.state().login_gate.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let mut state = self.state();
        state.check_reachable()?;
        match state.accounts.get(email.as_str()) {
            Some(account) if account.password == password.expose_secret() => Ok(AuthGrant {
                token: Some(SecretString::from(account.token.clone())),
                user: Some(account.profile.clone()),
            }),
            _ => Err(ApiError::Deauthorized("Invalid email or password".to_string())),
        }
    }

    async fn register(
        &self,
        name: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthGrant, ApiError> {
        let mut state = self.state();
        state.check_reachable()?;
        if state.accounts.contains_key(email.as_str()) {
            return Err(ApiError::Rejected("User already exists".to_string()));
        }
        let token = format!("token-{email}");
        let profile = UserProfile {
            id: None,
            name: name.to_string(),
            email: email.to_string(),
        };
        state.accounts.insert(
            email.to_string(),
            Account {
                password: password.expose_secret().to_string(),
                token: token.clone(),
                profile: profile.clone(),
            },
        );
        state.carts.insert(token.clone(), Vec::new());

        if state.register_without_token {
            return Ok(AuthGrant {
                token: None,
                user: None,
            });
        }
        Ok(AuthGrant {
            token: Some(SecretString::from(token)),
            user: Some(profile),
        })
    }
}

pub fn product(id: &str, name: &str, price: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: String::new(),
        category: "Grocery".to_string(),
        subcategory: None,
        price: Decimal::from(price),
        old_price: None,
        image: String::new(),
        out_of_stock: false,
    }
}
