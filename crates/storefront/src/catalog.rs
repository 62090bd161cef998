//! In-memory catalog snapshot and category browsing.
//!
//! The snapshot is replaced wholesale on every refresh and read by the
//! search index, the guest cart paint and the category views. Readers get a
//! cheap `Arc` clone of the current product list, so a refresh never
//! disturbs a filter pass already running over the previous one.

use std::sync::{Arc, PoisonError, RwLock};

use kreg_core::{Product, ProductId};
use rust_decimal::Decimal;

use crate::search::SearchState;

/// Shared, swappable product list.
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<RwLock<Arc<[Product]>>>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::from(Vec::new()))),
        }
    }

    /// Swap in a freshly fetched product list.
    pub fn replace(&self, products: Vec<Product>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Arc::from(products);
    }

    /// Drop every product.
    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    /// The current product list, in catalog order.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[Product]> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Look up a product by id.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<Product> {
        self.snapshot()
            .iter()
            .find(|p| &p.id == product_id)
            .cloned()
    }

    /// Unit price of a product, if it is in the snapshot.
    #[must_use]
    pub fn price_of(&self, product_id: &ProductId) -> Option<Decimal> {
        self.snapshot()
            .iter()
            .find(|p| &p.id == product_id)
            .map(|p| p.price)
    }

    /// First `limit` products of a category, from the full catalog.
    #[must_use]
    pub fn category_preview(&self, category: &str, limit: usize) -> Vec<Product> {
        self.snapshot()
            .iter()
            .filter(|p| p.category == category)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Products of one category grouped by subcategory.
    ///
    /// Active, non-empty search results narrow the source list; otherwise
    /// the full catalog is used.
    #[must_use]
    pub fn category_view(&self, category: &str, search: &SearchState) -> CategoryView {
        let snapshot = self.snapshot();
        let source: &[Product] = if search.active && !search.results.is_empty() {
            &search.results
        } else {
            &snapshot
        };
        CategoryView::build(category, source)
    }
}

/// Products sharing a subcategory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcategoryGroup {
    pub name: String,
    pub products: Vec<Product>,
}

/// A category page: subcategory groups in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryView {
    pub category: String,
    pub groups: Vec<SubcategoryGroup>,
    pub total: usize,
}

impl CategoryView {
    fn build(category: &str, source: &[Product]) -> Self {
        let mut groups: Vec<SubcategoryGroup> = Vec::new();
        let mut total = 0;

        for product in source.iter().filter(|p| p.category == category) {
            let name = product.subcategory_or_default();
            match groups.iter_mut().find(|g| g.name == name) {
                Some(group) => group.products.push(product.clone()),
                None => groups.push(SubcategoryGroup {
                    name: name.to_string(),
                    products: vec![product.clone()],
                }),
            }
            total += 1;
        }

        Self {
            category: category.to_string(),
            groups,
            total,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }
}
