//! Catalog browsing commands.

use std::time::Duration;

use kreg_core::{ProductId, format_price};
use kreg_storefront::search::{DebouncedSearch, SearchIndex, SearchState};
use kreg_storefront::SyncError;

use super::{Storefront, product_line};

/// List the catalog, optionally narrowed to one category.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn products(sync: &Storefront, category: Option<&str>) -> Result<(), SyncError> {
    sync.refresh_catalog().await?;
    let snapshot = sync.catalog().snapshot();
    let mut shown = 0;
    for product in snapshot
        .iter()
        .filter(|p| category.is_none_or(|c| p.category == c))
    {
        println!("{}", product_line(product));
        shown += 1;
    }
    println!("{shown} products");
    Ok(())
}

/// Show one product in full.
///
/// # Errors
///
/// Returns an error if the product cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn product(sync: &Storefront, id: &str) -> Result<(), SyncError> {
    let product = sync.product(&ProductId::new(id)).await?;
    println!("{}", product.name);
    println!("  id:          {}", product.id);
    println!(
        "  category:    {} / {}",
        product.category,
        product.subcategory_or_default()
    );
    println!("  price:       {}", format_price(product.price));
    if let Some(old) = product.old_price {
        println!("  old price:   {}", format_price(old));
    }
    println!(
        "  stock:       {}",
        if product.out_of_stock {
            "out of stock"
        } else {
            "in stock"
        }
    );
    if !product.description.is_empty() {
        println!();
        println!("{}", product.description);
    }
    Ok(())
}

/// Run a query through the debounced search and print the settled results.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn search(sync: &Storefront, query: &str, quiet: Duration) -> Result<(), SyncError> {
    sync.refresh_catalog().await?;

    let search = DebouncedSearch::spawn(SearchIndex::new(sync.catalog().clone()), quiet);
    let mut results = search.subscribe();
    search.set_query(query);
    if results.changed().await.is_err() {
        return Ok(());
    }
    let state = results.borrow_and_update().clone();

    if !state.active {
        println!("Type something to search");
        return Ok(());
    }
    for product in &state.results {
        println!("{}", product_line(product));
    }
    println!("{} results for \"{}\"", state.results.len(), state.query);
    Ok(())
}

/// Show a category page, or its first `limit` products.
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn category(
    sync: &Storefront,
    name: &str,
    limit: Option<usize>,
) -> Result<(), SyncError> {
    sync.refresh_catalog().await?;

    if let Some(limit) = limit {
        for product in sync.catalog().category_preview(name, limit) {
            println!("{}", product_line(&product));
        }
        return Ok(());
    }

    let view = sync.catalog().category_view(name, &SearchState::default());
    if view.is_empty() {
        println!("No products in {name}");
        return Ok(());
    }
    println!("{} ({} items)", view.category, view.total);
    for group in &view.groups {
        println!();
        println!("{}", group.name);
        for product in &group.products {
            println!("  {}", product_line(product));
        }
    }
    Ok(())
}
