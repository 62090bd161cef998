//! Persistent cart mirror.

use std::sync::Arc;

use kreg_core::LineItem;
use tracing::warn;

use super::{KeyValueStore, StoreError};

const CART_KEY: &str = "cart";

/// Local copy of the last cart shown, for immediate paint at startup.
///
/// Never authoritative: once a session token exists the server's cart
/// replaces whatever is stored here.
#[derive(Clone)]
pub struct CartCache {
    store: Arc<dyn KeyValueStore>,
}

impl CartCache {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the cached lines.
    ///
    /// A value that is not a JSON list of line items is deleted and treated
    /// as an empty cart. Read failures also yield an empty cart.
    #[must_use]
    pub fn load(&self) -> Vec<LineItem> {
        let raw = match self.store.get(CART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read cart mirror");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<LineItem>>(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Discarding corrupt cart mirror");
                if let Err(e) = self.store.remove(CART_KEY) {
                    warn!(error = %e, "Failed to remove corrupt cart mirror");
                }
                Vec::new()
            }
        }
    }

    /// Overwrite the mirror.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    pub fn save(&self, items: &[LineItem]) -> Result<(), StoreError> {
        let json = serde_json::to_string(items)?;
        self.store.set(CART_KEY, &json)
    }
}
