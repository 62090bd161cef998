//! Session state and its persistence.

use std::fmt;
use std::sync::Arc;

use kreg_core::UserProfile;
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use super::{KeyValueStore, StoreError};

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "user";

/// Authentication token plus the cached profile.
///
/// A profile is only ever held together with a token; the constructors are
/// the only way to build one, and clearing drops both at once.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone, Default)]
pub struct Session {
    token: Option<SecretString>,
    user: Option<UserProfile>,
}

impl Session {
    /// No token, no profile.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A logged-in session.
    #[must_use]
    pub const fn authenticated(token: SecretString, user: Option<UserProfile>) -> Self {
        Self {
            token: Some(token),
            user,
        }
    }

    #[must_use]
    pub const fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }

    #[must_use]
    pub const fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .finish()
    }
}

/// Durable session storage.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the persisted session.
    ///
    /// A profile stored without a token is ignored, as is one that no longer
    /// parses. Read failures yield an anonymous session.
    #[must_use]
    pub fn load(&self) -> Session {
        let token = match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read session token");
                None
            }
        };
        let Some(token) = token else {
            return Session::anonymous();
        };

        let user = match self.store.get(USER_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<UserProfile>(&raw)
                .inspect_err(|e| warn!(error = %e, "Ignoring unreadable cached profile"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached profile");
                None
            }
        };

        Session::authenticated(SecretString::from(token), user)
    }

    /// Persist a session; an anonymous session clears storage.
    ///
    /// The token is written last and only after the old one is gone, so an
    /// interrupted save leaves an anonymous session, never one token paired
    /// with another account's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if either key cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        let Some(token) = session.token() else {
            return self.clear();
        };
        self.store.remove(TOKEN_KEY)?;
        match session.user() {
            Some(user) => self.store.set(USER_KEY, &serde_json::to_string(user)?)?,
            None => self.store.remove(USER_KEY)?,
        }
        self.store.set(TOKEN_KEY, token.expose_secret())
    }

    /// Remove token and profile.
    ///
    /// # Errors
    ///
    /// Returns an error if either key cannot be removed.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)
    }
}
