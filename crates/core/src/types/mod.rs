//! Core types for Kreg Market.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod product;
pub mod user;

pub use cart::{Cart, LineItem};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::format_price;
pub use product::Product;
pub use user::UserProfile;
