//! Cart/session synchronizer.
//!
//! [`CartSync`] is the single owner of cart and session state. It performs
//! the remote calls, feeds their outcomes to the pure [`Machine`], executes
//! the resulting effects and publishes a [`Snapshot`] to subscribers.
//!
//! # Flow
//!
//! ```text
//! mutation ──▶ authorize ──▶ remote call ──▶ MutationAccepted ──▶ FetchCart
//!                                                                    │
//!            subscribers ◀── publish ◀── PersistCart ◀── CartLoaded ◀┘
//! ```
//!
//! Every accepted mutation is followed by a full cart fetch; the client
//! never patches quantities or totals locally.
//!
//! The machine lock is held only for synchronous work, never across a remote
//! call. Transitions, local writes and publishing all happen under it. Between issuing a call
//! and its completion the visible state is unchanged.

pub mod machine;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kreg_core::{Cart, Email, Product, ProductId};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, AuthGrant, Backend};
use crate::catalog::Catalog;
use crate::error::{Result, SyncError};
use crate::store::{CartCache, KeyValueStore, Session, SessionStore};

pub use machine::{Credential, Effect, Event, Fetch, Machine, Phase, Snapshot};

/// Result of a successful login or registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// A session was established.
    LoggedIn,
    /// The account exists but the server issued no token; log in next.
    LoginRequired,
}

/// The synchronizer. Cheap to clone; clones share state.
pub struct CartSync<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for CartSync<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B> {
    backend: B,
    carts: CartCache,
    sessions: SessionStore,
    catalog: Catalog,
    machine: Mutex<Machine>,
    state: watch::Sender<Snapshot>,
}

impl<B: Backend> CartSync<B> {
    /// Create a synchronizer in the `Guest` phase with an empty catalog.
    ///
    /// Nothing is read from `store` until [`restore`](Self::restore) or
    /// [`bootstrap`](Self::bootstrap).
    ///
    /// `store` is written synchronously under the state lock; see
    /// [`KeyValueStore`] for what that asks of an implementation.
    pub fn new(backend: B, store: Arc<dyn KeyValueStore>) -> Self {
        let machine = Machine::new();
        let (state, _) = watch::channel(machine.snapshot());
        Self {
            inner: Arc::new(Inner {
                backend,
                carts: CartCache::new(Arc::clone(&store)),
                sessions: SessionStore::new(store),
                catalog: Catalog::new(),
                machine: Mutex::new(machine),
                state,
            }),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every visible state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.state.subscribe()
    }

    /// The catalog snapshot shared with search and category views.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Load the persisted session and cart mirror without any network call.
    ///
    /// The cached token is trusted until a server call rejects it. Cached
    /// lines are priced from the catalog snapshot when every product is
    /// known; refresh the catalog first for a priced paint.
    pub fn restore(&self) -> Snapshot {
        let session = self.inner.sessions.load();
        let cart = Cart::from_cached(self.inner.carts.load(), |id| {
            self.inner.catalog.price_of(id)
        });
        debug!(
            authenticated = session.is_authenticated(),
            items = cart.item_count(),
            "Restored local state"
        );
        self.dispatch(Event::Restored { session, cart });
        self.snapshot()
    }

    /// [`restore`](Self::restore), then reconcile with the server cart.
    ///
    /// Never fails: a rejected token ends in `LoggedOut`, any other failure
    /// in an empty cart.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Snapshot {
        self.restore();
        if let Err(e) = self.refresh_cart().await {
            warn!(error = %e, "Initial cart reconcile failed");
        }
        self.snapshot()
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Pull the authoritative cart and make it current.
    ///
    /// Without a session the cart is emptied locally. Any failure also
    /// empties the cart rather than leaving a possibly stale one on display.
    ///
    /// # Errors
    ///
    /// `NotReady` while authenticating; otherwise the fetch error.
    #[instrument(skip(self))]
    pub async fn refresh_cart(&self) -> Result<Cart> {
        let fetch = self.lock().begin_fetch()?;
        let (seq, credential) = match fetch {
            Fetch::Remote { seq, credential } => (seq, credential),
            Fetch::Local { seq } => {
                self.dispatch(Event::CartReset { seq });
                return Ok(self.snapshot().cart);
            }
        };

        match self.inner.backend.fetch_cart(&credential.token).await {
            Ok(cart) => {
                debug!(seq, items = cart.item_count(), "Cart fetched");
                self.dispatch(Event::CartLoaded { seq, cart });
                Ok(self.snapshot().cart)
            }
            Err(err @ ApiError::Deauthorized(_)) => Err(self.surface(credential.epoch, err)),
            Err(e) => {
                warn!(seq, error = %e, "Cart fetch failed, showing empty cart");
                self.dispatch(Event::CartReset { seq });
                Err(e.into())
            }
        }
    }

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// `Unauthenticated` or `NotReady` before any call; otherwise the remote
    /// error, with state unchanged (or logged out on `Deauthorized`).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_to_cart(&self, product_id: &ProductId) -> Result<Cart> {
        check_product_id(product_id)?;
        let credential = self.authorize()?;
        let outcome = self
            .inner
            .backend
            .add_item(&credential.token, product_id)
            .await;
        self.settle(credential.epoch, outcome).await
    }

    /// Set the quantity of a line. The value is sent as given; a value of
    /// zero or below is left to the server to interpret.
    ///
    /// # Errors
    ///
    /// Same as [`add_to_cart`](Self::add_to_cart).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_cart(&self, product_id: &ProductId, quantity: i64) -> Result<Cart> {
        check_product_id(product_id)?;
        let credential = self.authorize()?;
        let outcome = self
            .inner
            .backend
            .update_item(&credential.token, product_id, quantity)
            .await;
        self.settle(credential.epoch, outcome).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Same as [`add_to_cart`](Self::add_to_cart).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<Cart> {
        check_product_id(product_id)?;
        let credential = self.authorize()?;
        let outcome = self
            .inner
            .backend
            .remove_item(&credential.token, product_id)
            .await;
        self.settle(credential.epoch, outcome).await
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Same as [`add_to_cart`](Self::add_to_cart).
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Cart> {
        let credential = self.authorize()?;
        let outcome = self.inner.backend.clear_cart(&credential.token).await;
        self.settle(credential.epoch, outcome).await
    }

    /// Finish a mutation: reconcile on success, surface the error otherwise.
    ///
    /// A failed follow-up fetch does not turn an accepted mutation into an
    /// error; the cart it leaves behind is returned.
    async fn settle(
        &self,
        epoch: u64,
        outcome: std::result::Result<(), ApiError>,
    ) -> Result<Cart> {
        match outcome {
            Ok(()) => {
                if self.dispatch(Event::MutationAccepted)
                    && let Err(e) = self.refresh_cart().await
                {
                    warn!(error = %e, "Cart reconcile after mutation failed");
                }
                Ok(self.snapshot().cart)
            }
            Err(e) => Err(self.surface(epoch, e)),
        }
    }

    /// Convert a remote error, forcing the logout transition for a dead token.
    ///
    /// `epoch` is the session whose token the call carried; a rejection that
    /// arrives after that session was replaced leaves the new one alone.
    fn surface(&self, epoch: u64, err: ApiError) -> SyncError {
        if matches!(err, ApiError::Deauthorized(_)) {
            info!(epoch, "Session token rejected");
            self.dispatch(Event::Deauthorized { epoch });
        }
        err.into()
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Log in and pull the account cart.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a malformed email or empty password, `NotReady` if
    /// another login is in flight, otherwise the remote error. Bad
    /// credentials surface as `Rejected`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<AuthOutcome> {
        let email = parse_email(email)?;
        require("Password", password.expose_secret())?;

        let guard = self.begin_auth()?;
        let grant = self.inner.backend.login(&email, password).await;
        self.finish_auth(guard, grant).await
    }

    /// Create an account, logging in when the server issues a token.
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login), plus `InvalidInput` for an empty name.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthOutcome> {
        require("Name", name)?;
        let email = parse_email(email)?;
        require("Password", password.expose_secret())?;

        let guard = self.begin_auth()?;
        let grant = self
            .inner
            .backend
            .register(name.trim(), &email, password)
            .await;
        self.finish_auth(guard, grant).await
    }

    /// Clear session and cart.
    pub fn logout(&self) {
        info!("Logging out");
        self.dispatch(Event::LoggedOut);
    }

    fn begin_auth(&self) -> Result<AuthGuard<'_, B>> {
        let mut machine = self.lock();
        machine.begin_auth()?;
        self.publish(&machine);
        drop(machine);
        Ok(AuthGuard {
            sync: self,
            armed: true,
        })
    }

    async fn finish_auth(
        &self,
        mut guard: AuthGuard<'_, B>,
        grant: std::result::Result<AuthGrant, ApiError>,
    ) -> Result<AuthOutcome> {
        guard.armed = false;
        match grant {
            Ok(AuthGrant {
                token: Some(token),
                user,
            }) => {
                info!("Authenticated");
                let session = Session::authenticated(token, user);
                if self.dispatch(Event::AuthSucceeded(session))
                    && let Err(e) = self.refresh_cart().await
                {
                    warn!(error = %e, "Cart fetch after login failed");
                }
                Ok(AuthOutcome::LoggedIn)
            }
            Ok(AuthGrant { token: None, .. }) => {
                info!("Account created, login required");
                self.dispatch(Event::AuthFailed);
                Ok(AuthOutcome::LoginRequired)
            }
            Err(e) => {
                self.dispatch(Event::AuthFailed);
                Err(match e {
                    ApiError::Deauthorized(message) => SyncError::Rejected(message),
                    other => other.into(),
                })
            }
        }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Replace the catalog snapshot from the server.
    ///
    /// On failure the snapshot is emptied.
    ///
    /// # Errors
    ///
    /// Returns the fetch error.
    #[instrument(skip(self))]
    pub async fn refresh_catalog(&self) -> Result<usize> {
        match self.inner.backend.fetch_products().await {
            Ok(products) => {
                let count = products.len();
                self.inner.catalog.replace(products);
                info!(count, "Catalog refreshed");
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Catalog fetch failed, clearing snapshot");
                self.inner.catalog.clear();
                Err(e.into())
            }
        }
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; an unknown id is `Rejected`.
    pub async fn product(&self, product_id: &ProductId) -> Result<Product> {
        Ok(self.inner.backend.fetch_product(product_id).await?)
    }

    // =========================================================================
    // Machine access
    // =========================================================================

    fn lock(&self) -> MutexGuard<'_, Machine> {
        self.inner
            .machine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn authorize(&self) -> Result<Credential> {
        let mut machine = self.lock();
        let credential = machine.authorize();
        self.publish(&machine);
        credential
    }

    /// Apply an event, run its local effects and publish.
    ///
    /// Returns whether the event asked for a cart fetch.
    fn dispatch(&self, event: Event) -> bool {
        let mut machine = self.lock();
        let effects = machine.apply(event);
        let needs_fetch = self.execute(effects);
        self.publish(&machine);
        needs_fetch
    }

    /// Local writes are best effort; a failed write never blocks a transition.
    fn execute(&self, effects: Vec<Effect>) -> bool {
        let mut needs_fetch = false;
        for effect in effects {
            match effect {
                Effect::FetchCart => needs_fetch = true,
                Effect::PersistCart(items) => {
                    if let Err(e) = self.inner.carts.save(&items) {
                        warn!(error = %e, "Failed to write cart mirror");
                    }
                }
                Effect::PersistSession(session) => {
                    if let Err(e) = self.inner.sessions.save(&session) {
                        warn!(error = %e, "Failed to persist session");
                    }
                }
                Effect::ClearSession => {
                    if let Err(e) = self.inner.sessions.clear() {
                        warn!(error = %e, "Failed to clear session");
                    }
                }
            }
        }
        needs_fetch
    }

    fn publish(&self, machine: &Machine) {
        let next = machine.snapshot();
        self.inner.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(phase = next.phase.as_str(), items = next.cart.item_count(), "State changed");
            *current = next;
            true
        });
    }
}

/// Returns the machine to its previous phase if a login is abandoned
/// mid-flight.
struct AuthGuard<'a, B: Backend> {
    sync: &'a CartSync<B>,
    armed: bool,
}

impl<B: Backend> Drop for AuthGuard<'_, B> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Login abandoned");
            self.sync.dispatch(Event::AuthFailed);
        }
    }
}

fn parse_email(raw: &str) -> Result<Email> {
    raw.parse::<Email>()
        .map_err(|e| SyncError::InvalidInput(e.to_string()))
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

fn check_product_id(product_id: &ProductId) -> Result<()> {
    require("Product id", product_id.as_str())
}
