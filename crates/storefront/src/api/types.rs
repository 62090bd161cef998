//! Wire types for the remote API.
//!
//! Every response carries `success` and an optional `message`; the payload
//! fields are only read once `success` is true.

use kreg_core::{Cart, Product, ProductId, UserProfile};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Common response header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /cart` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartPayload {
    #[serde(default)]
    pub cart_items: Vec<CartItemPayload>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub item_count: Option<i64>,
}

/// One line of a `GET /cart` payload.
///
/// Quantity is signed on the wire; invalid lines are dropped when the cart
/// is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemPayload {
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: i64,
}

impl CartPayload {
    /// Convert into a domain cart.
    #[must_use]
    pub fn into_cart(self) -> Cart {
        let cart = Cart::from_server(
            self.cart_items
                .into_iter()
                .map(|item| (item.product_id, item.quantity)),
            self.total_amount.unwrap_or(Decimal::ZERO),
        );
        if let Some(reported) = self.item_count
            && u64::try_from(reported).ok() != Some(cart.item_count())
        {
            tracing::debug!(
                reported,
                computed = cart.item_count(),
                "server itemCount differs from line quantities"
            );
        }
        cart
    }
}

/// `GET /product/all` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductsPayload {
    #[serde(default)]
    pub products: Vec<Product>,
}

/// `GET /product/{id}` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPayload {
    #[serde(default)]
    pub product: Option<Product>,
}

/// `POST /user/Login` and `POST /user/Register` payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthPayload {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Acknowledgement-only payload for cart mutations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ack {}

/// `POST /cart/add` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest<'a> {
    pub item_id: &'a ProductId,
}

/// `PUT /cart/update` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest<'a> {
    pub item_id: &'a ProductId,
    pub quantity: i64,
}

/// Login / registration body.
#[derive(Debug, Serialize)]
pub struct CredentialsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    pub email: &'a str,
    pub password: &'a str,
}
