//! CLI command implementations.

pub mod account;
pub mod cart;
pub mod catalog;

use kreg_core::{Product, format_price};
use kreg_storefront::api::HttpApi;
use kreg_storefront::sync::CartSync;

/// The synchronizer as wired for the CLI.
pub type Storefront = CartSync<HttpApi>;

/// One catalog line: id, name, price, and stock/discount markers.
fn product_line(product: &Product) -> String {
    let mut line = format!(
        "{:<26} {:<32} {:>9}",
        product.id.as_str(),
        product.name,
        format_price(product.price)
    );
    if let Some(old) = product.old_price.filter(|_| product.is_discounted()) {
        line.push_str(&format!("  (was {})", format_price(old)));
    }
    if product.out_of_stock {
        line.push_str("  [out of stock]");
    }
    line
}
