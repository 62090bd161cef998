//! Cart commands.
//!
//! Every command reconciles with the server first, so what is printed is
//! always the cart of record.

use kreg_core::{Cart, ProductId, format_price};
use kreg_storefront::SyncError;
use rust_decimal::Decimal;
use tracing::warn;

use super::Storefront;

async fn start(sync: &Storefront) {
    // Names and prices for display only; totals come from the server
    if let Err(e) = sync.refresh_catalog().await {
        warn!(error = %e, "Catalog unavailable, showing ids only");
    }
    sync.bootstrap().await;
}

#[allow(clippy::print_stdout)]
fn print_cart(sync: &Storefront, cart: &Cart) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }
    for line in cart.items() {
        let quantity = line.quantity.get();
        match sync.catalog().get(&line.product_id) {
            Some(product) => println!(
                "{quantity:>3} x {:<32} {:>9}",
                product.name,
                format_price(product.price * Decimal::from(quantity))
            ),
            None => println!("{quantity:>3} x {}", line.product_id),
        }
    }
    println!(
        "{} items, total {}",
        cart.item_count(),
        format_price(cart.total_amount())
    );
}

/// Print the reconciled cart.
pub async fn show(sync: &Storefront) {
    start(sync).await;
    print_cart(sync, &sync.snapshot().cart);
}

/// # Errors
///
/// Returns an error if not logged in or the server refuses the change.
pub async fn add(sync: &Storefront, id: &str) -> Result<(), SyncError> {
    start(sync).await;
    let cart = sync.add_to_cart(&ProductId::new(id)).await?;
    print_cart(sync, &cart);
    Ok(())
}

/// # Errors
///
/// Returns an error if not logged in or the server refuses the change.
pub async fn update(sync: &Storefront, id: &str, quantity: i64) -> Result<(), SyncError> {
    start(sync).await;
    let cart = sync.update_cart(&ProductId::new(id), quantity).await?;
    print_cart(sync, &cart);
    Ok(())
}

/// # Errors
///
/// Returns an error if not logged in or the server refuses the change.
pub async fn remove(sync: &Storefront, id: &str) -> Result<(), SyncError> {
    start(sync).await;
    let cart = sync.remove_from_cart(&ProductId::new(id)).await?;
    print_cart(sync, &cart);
    Ok(())
}

/// # Errors
///
/// Returns an error if not logged in or the server refuses the change.
pub async fn clear(sync: &Storefront) -> Result<(), SyncError> {
    start(sync).await;
    let cart = sync.clear_cart().await?;
    print_cart(sync, &cart);
    Ok(())
}
