//! Pure cart/session state machine.
//!
//! Holds the phase, session and cart, and turns events into effects the
//! driver executes. No I/O happens here, so every transition is testable
//! synchronously.
//!
//! ```text
//! Guest ──login──▶ Authenticating ──ok──▶ Authenticated
//!   ▲                   │ fail                 │ logout / token rejected
//!   │                   ▼                      ▼
//!   └──── next op ◀── LoggedOut ◀──────────────┘
//! ```
//!
//! Cart fetches are numbered. A response is applied only if its number is
//! above the last applied one, so a slow response can never overwrite a
//! newer cart. Logging out or starting a new login moves the watermark past
//! every fetch issued so far.
//!
//! Sessions are numbered too. A token rejection names the session whose
//! token was sent, and is ignored once that session has been replaced.

use kreg_core::{Cart, LineItem, UserProfile};
use secrecy::SecretString;
use tracing::debug;

use crate::error::SyncError;
use crate::store::Session;

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No token; cart operations require logging in.
    Guest,
    /// A login or registration call is in flight.
    Authenticating,
    /// Token present and accepted so far.
    Authenticated,
    /// Session ended by logout or token rejection.
    LoggedOut,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::LoggedOut => "logged out",
        }
    }
}

/// What observers see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: Phase,
    pub user: Option<UserProfile>,
    pub cart: Cart,
}

/// Inputs to the machine.
#[derive(Debug)]
pub enum Event {
    /// Persisted state was loaded at startup.
    Restored { session: Session, cart: Cart },
    /// Login or registration returned a token.
    AuthSucceeded(Session),
    /// Login or registration ended without a token.
    AuthFailed,
    /// Cart fetch `seq` returned.
    CartLoaded { seq: u64, cart: Cart },
    /// Cart fetch `seq` failed, or there was no session to fetch with.
    CartReset { seq: u64 },
    /// The server accepted a cart mutation.
    MutationAccepted,
    /// The server rejected the token of session `epoch`.
    Deauthorized { epoch: u64 },
    /// The user logged out.
    LoggedOut,
}

/// Work for the driver.
#[derive(Debug)]
pub enum Effect {
    /// Pull the authoritative cart.
    FetchCart,
    /// Overwrite the cart mirror.
    PersistCart(Vec<LineItem>),
    /// Write token and profile.
    PersistSession(Session),
    /// Remove token and profile.
    ClearSession,
}

/// A session token handed out for one remote call.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: SecretString,
    /// Session the token belongs to.
    pub epoch: u64,
}

/// How a cart fetch is to be served.
#[derive(Debug)]
pub enum Fetch {
    /// Ask the server with this credential.
    Remote { seq: u64, credential: Credential },
    /// No session: the cart is empty without a network call.
    Local { seq: u64 },
}

#[derive(Debug)]
pub struct Machine {
    phase: Phase,
    session: Session,
    cart: Cart,
    issued: u64,
    applied: u64,
    epoch: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Guest,
            session: Session::anonymous(),
            cart: Cart::empty(),
            issued: 0,
            applied: 0,
            epoch: 0,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            user: self.session.user().cloned(),
            cart: self.cart.clone(),
        }
    }

    /// Token for a cart mutation.
    ///
    /// # Errors
    ///
    /// `NotReady` while authenticating, `Unauthenticated` without a session.
    /// A `LoggedOut` machine falls back to `Guest` here.
    pub fn authorize(&mut self) -> Result<Credential, SyncError> {
        match self.phase {
            Phase::Authenticated => self.credential().ok_or(SyncError::Unauthenticated),
            Phase::Authenticating => Err(SyncError::NotReady),
            Phase::Guest => Err(SyncError::Unauthenticated),
            Phase::LoggedOut => {
                debug!("Logged-out session returning to guest");
                self.phase = Phase::Guest;
                Err(SyncError::Unauthenticated)
            }
        }
    }

    /// Number a new cart fetch.
    ///
    /// # Errors
    ///
    /// `NotReady` while authenticating.
    pub fn begin_fetch(&mut self) -> Result<Fetch, SyncError> {
        if self.phase == Phase::Authenticating {
            return Err(SyncError::NotReady);
        }
        self.issued += 1;
        let seq = self.issued;
        match (self.phase, self.credential()) {
            (Phase::Authenticated, Some(credential)) => Ok(Fetch::Remote { seq, credential }),
            _ => Ok(Fetch::Local { seq }),
        }
    }

    fn credential(&self) -> Option<Credential> {
        self.session.token().map(|token| Credential {
            token: token.clone(),
            epoch: self.epoch,
        })
    }

    /// Install a new session; rejections of the old one no longer apply.
    fn replace_session(&mut self, session: Session) {
        self.session = session;
        self.epoch += 1;
    }

    /// Enter `Authenticating`.
    ///
    /// # Errors
    ///
    /// `NotReady` if another login is already in flight.
    pub fn begin_auth(&mut self) -> Result<(), SyncError> {
        if self.phase == Phase::Authenticating {
            return Err(SyncError::NotReady);
        }
        self.phase = Phase::Authenticating;
        self.applied = self.issued;
        Ok(())
    }

    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Restored { session, cart } => {
                self.phase = if session.is_authenticated() {
                    Phase::Authenticated
                } else {
                    Phase::Guest
                };
                self.replace_session(session);
                self.cart = cart;
                self.applied = self.issued;
                vec![Effect::FetchCart]
            }

            Event::AuthSucceeded(session) => {
                self.phase = Phase::Authenticated;
                self.replace_session(session.clone());
                self.cart = Cart::empty();
                self.applied = self.issued;
                vec![Effect::PersistSession(session), Effect::FetchCart]
            }

            Event::AuthFailed => {
                if self.phase == Phase::Authenticating {
                    self.phase = if self.session.is_authenticated() {
                        Phase::Authenticated
                    } else {
                        Phase::Guest
                    };
                }
                Vec::new()
            }

            Event::CartLoaded { seq, cart } => {
                if !self.accept(seq) {
                    return Vec::new();
                }
                self.cart = cart;
                vec![Effect::PersistCart(self.cart.items().to_vec())]
            }

            Event::CartReset { seq } => {
                if !self.accept(seq) {
                    return Vec::new();
                }
                self.cart = Cart::empty();
                vec![Effect::PersistCart(Vec::new())]
            }

            Event::MutationAccepted => vec![Effect::FetchCart],

            Event::Deauthorized { epoch } if epoch != self.epoch => {
                debug!(epoch, current = self.epoch, "Ignoring rejection of a replaced session");
                Vec::new()
            }

            Event::Deauthorized { .. } | Event::LoggedOut => {
                if self.phase == Phase::LoggedOut && !self.session.is_authenticated() {
                    return Vec::new();
                }
                // A login in flight decides the phase when it completes.
                if self.phase != Phase::Authenticating {
                    self.phase = Phase::LoggedOut;
                }
                self.replace_session(Session::anonymous());
                self.cart = Cart::empty();
                self.applied = self.issued;
                vec![Effect::ClearSession, Effect::PersistCart(Vec::new())]
            }
        }
    }

    fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            debug!(seq, applied = self.applied, "Discarding stale cart response");
            return false;
        }
        self.applied = seq;
        true
    }
}
