//! Kreg Market Core - Shared types library.
//!
//! This crate provides the domain types used across all Kreg Market components:
//! - `storefront` - Cart/session synchronizer, catalog and search
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no persistence,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, emails, products, carts and user profiles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
