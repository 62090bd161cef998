//! Kreg Market storefront client core.
//!
//! Keeps one consistent view of cart, session and catalog search for a UI
//! layer, reconciling a local cart mirror, the server's cart of record and a
//! debounced search over the last fetched catalog.
//!
//! # Modules
//!
//! - [`sync`] - Cart/session synchronizer and its pure state machine
//! - [`api`] - Remote cart, catalog and auth services (`reqwest`)
//! - [`store`] - Durable cart mirror and session storage
//! - [`catalog`] - Catalog snapshot and category browsing
//! - [`search`] - Substring search and the debounced driver
//! - [`config`] - Environment configuration
//! - [`error`] - Error taxonomy surfaced to the UI
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kreg_storefront::api::HttpApi;
//! use kreg_storefront::config::ClientConfig;
//! use kreg_storefront::store::FileStore;
//! use kreg_storefront::sync::CartSync;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let api = HttpApi::new(&config)?;
//! let sync = CartSync::new(api, Arc::new(FileStore::new(&config.data_dir)));
//!
//! let _ = sync.refresh_catalog().await;
//! let snapshot = sync.bootstrap().await;
//! println!("{} items in cart", snapshot.cart.item_count());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod search;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use error::{Result, SyncError};
