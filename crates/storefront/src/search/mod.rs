//! Product search over the catalog snapshot.
//!
//! This is a display filter, not a ranking engine:
//! - case-insensitive substring match on name, description or category
//! - results keep catalog order
//! - a blank query clears the search instead of returning everything
//!
//! [`SearchIndex::search`] is pure and synchronous. Keystroke handling goes
//! through [`DebouncedSearch`], which runs the filter only once input has
//! settled for the configured quiet period.

mod debounce;

use kreg_core::Product;
use tracing::{debug, instrument};

use crate::catalog::Catalog;

pub use debounce::{DebouncedSearch, Debouncer};

/// Outcome of a filter pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchState {
    /// Normalized query the results were computed for.
    pub query: String,
    pub results: Vec<Product>,
    /// Whether a non-blank query is in effect.
    pub active: bool,
    /// Incremented once per published pass; 0 until the first one.
    pub revision: u64,
}

/// Substring filter over the current catalog snapshot.
#[derive(Clone)]
pub struct SearchIndex {
    catalog: Catalog,
}

impl SearchIndex {
    #[must_use]
    pub const fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Filter the catalog by `query`.
    ///
    /// The returned state carries revision 0; publishers stamp their own.
    #[must_use]
    #[instrument(skip(self))]
    pub fn search(&self, query: &str) -> SearchState {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return SearchState::default();
        }

        let results: Vec<Product> = self
            .catalog
            .snapshot()
            .iter()
            .filter(|p| matches(p, &needle))
            .cloned()
            .collect();

        debug!(results = results.len(), "Search pass complete");

        SearchState {
            query: needle,
            results,
            active: true,
            revision: 0,
        }
    }
}

/// Whether any searchable field contains `needle` (already lowercased).
fn matches(product: &Product, needle: &str) -> bool {
    [&product.name, &product.description, &product.category]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use kreg_core::ProductId;
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: &str, name: &str, description: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            subcategory: None,
            price: Decimal::ONE,
            old_price: None,
            image: String::new(),
            out_of_stock: false,
        }
    }

    fn index() -> SearchIndex {
        let catalog = Catalog::new();
        catalog.replace(vec![
            product("1", "Milk 1L", "", "Dairy"),
            product("2", "Dark Chocolate", "70% cocoa", "Sweets"),
            product("3", "Farm Bottle", "fresh whole milk", "Dairy"),
            product("4", "Sourdough", "", "Bakery"),
        ]);
        SearchIndex::new(catalog)
    }

    #[test]
    fn test_matches_name_or_description() {
        let state = index().search("milk");
        let ids: Vec<_> = state.results.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(state.active);
        assert_eq!(state.query, "milk");
    }

    #[test]
    fn test_matches_category_case_insensitively() {
        let state = index().search("  BAKERY ");
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.results[0].name, "Sourdough");
        assert_eq!(state.query, "bakery");
    }

    #[test]
    fn test_blank_query_is_inactive_and_empty() {
        let index = index();
        let _ = index.search("milk");
        for query in ["", "   ", "\t"] {
            let state = index.search(query);
            assert!(state.results.is_empty());
            assert!(!state.active);
            assert_eq!(state.query, "");
        }
    }

    #[test]
    fn test_no_match_is_active_with_no_results() {
        let state = index().search("caviar");
        assert!(state.active);
        assert!(state.results.is_empty());
    }

    #[test]
    fn test_search_follows_catalog_refresh() {
        let catalog = Catalog::new();
        let index = SearchIndex::new(catalog.clone());
        assert!(index.search("milk").results.is_empty());

        catalog.replace(vec![product("9", "Oat Milk", "", "Dairy")]);
        assert_eq!(index.search("milk").results.len(), 1);
    }
}
