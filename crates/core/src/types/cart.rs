//! Cart and line item types.
//!
//! A [`Cart`] is always built through one of its constructors so that the
//! invariants hold for every value in circulation:
//!
//! - each product appears at most once, in first-seen order
//! - every line has a positive quantity (a zero line is absent)
//! - `item_count` is the sum of line quantities
//!
//! `total_amount` is never derived from prices on the client when the server
//! supplied one.

use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: NonZeroU32,
}

impl LineItem {
    /// Create a line item, or `None` when the quantity is not positive.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: i64) -> Option<Self> {
        let quantity = u32::try_from(quantity).ok().and_then(NonZeroU32::new)?;
        Some(Self {
            product_id,
            quantity,
        })
    }
}

/// A cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<LineItem>,
    total_amount: Decimal,
    item_count: u64,
}

impl Default for Cart {
    fn default() -> Self {
        Self::empty()
    }
}

impl Cart {
    /// The empty cart: no lines, zero total, zero count.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            item_count: 0,
        }
    }

    /// Build a cart from an authoritative server response.
    ///
    /// Lines with a non-positive quantity are dropped and repeated products
    /// are folded into their first occurrence. A negative total is clamped
    /// to zero.
    #[must_use]
    pub fn from_server(
        lines: impl IntoIterator<Item = (ProductId, i64)>,
        total_amount: Decimal,
    ) -> Self {
        let items = normalize(lines);
        Self {
            item_count: count(&items),
            items,
            total_amount: total_amount.max(Decimal::ZERO),
        }
    }

    /// Build a cart from locally cached lines for the guest paint.
    ///
    /// The total is the sum of `quantity * price` only when `price_of` knows
    /// every product; otherwise it is zero rather than a partial sum.
    #[must_use]
    pub fn from_cached(
        lines: Vec<LineItem>,
        price_of: impl Fn(&ProductId) -> Option<Decimal>,
    ) -> Self {
        let items = normalize(
            lines
                .into_iter()
                .map(|line| (line.product_id, i64::from(line.quantity.get()))),
        );
        let total_amount = items
            .iter()
            .map(|line| price_of(&line.product_id).map(|p| p * Decimal::from(line.quantity.get())))
            .sum::<Option<Decimal>>()
            .unwrap_or(Decimal::ZERO);
        Self {
            item_count: count(&items),
            items,
            total_amount,
        }
    }

    /// Line items in display order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Total amount as computed by the server.
    #[must_use]
    pub const fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    /// Sum of all line quantities.
    #[must_use]
    pub const fn item_count(&self) -> u64 {
        self.item_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Quantity of a product in the cart (0 when absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.items
            .iter()
            .find(|line| &line.product_id == product_id)
            .map_or(0, |line| line.quantity.get())
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }
}

fn normalize(lines: impl IntoIterator<Item = (ProductId, i64)>) -> Vec<LineItem> {
    let mut items: Vec<LineItem> = Vec::new();
    for (product_id, quantity) in lines {
        let Some(line) = LineItem::new(product_id, quantity) else {
            continue;
        };
        match items.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity.get());
            }
            None => items.push(line),
        }
    }
    items
}

fn count(items: &[LineItem]) -> u64 {
    items.iter().map(|line| u64::from(line.quantity.get())).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pid(s: &str) -> ProductId {
        ProductId::new(s)
    }

    #[test]
    fn test_line_item_rejects_non_positive() {
        assert!(LineItem::new(pid("a"), 0).is_none());
        assert!(LineItem::new(pid("a"), -3).is_none());
        assert_eq!(LineItem::new(pid("a"), 2).unwrap().quantity.get(), 2);
    }

    #[test]
    fn test_from_server_drops_zero_lines_and_folds_duplicates() {
        let cart = Cart::from_server(
            vec![(pid("a"), 2), (pid("b"), 0), (pid("c"), 1), (pid("a"), 1)],
            Decimal::new(1050, 2),
        );
        let ids: Vec<_> = cart.items().iter().map(|l| l.product_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(cart.quantity_of(&pid("a")), 3);
        assert_eq!(cart.quantity_of(&pid("b")), 0);
        assert_eq!(cart.item_count(), 4);
        assert_eq!(cart.total_amount(), Decimal::new(1050, 2));
    }

    #[test]
    fn test_from_server_clamps_negative_total() {
        let cart = Cart::from_server(Vec::new(), Decimal::new(-1, 0));
        assert_eq!(cart, Cart::empty());
    }

    #[test]
    fn test_from_cached_prices_known_products() {
        let lines = vec![
            LineItem::new(pid("a"), 2).unwrap(),
            LineItem::new(pid("b"), 1).unwrap(),
        ];
        let cart = Cart::from_cached(lines, |id| match id.as_str() {
            "a" => Some(Decimal::new(150, 2)),
            "b" => Some(Decimal::new(400, 2)),
            _ => None,
        });
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total_amount(), Decimal::new(700, 2));
    }

    #[test]
    fn test_from_cached_unknown_price_defaults_total_to_zero() {
        let lines = vec![
            LineItem::new(pid("a"), 2).unwrap(),
            LineItem::new(pid("missing"), 1).unwrap(),
        ];
        let cart = Cart::from_cached(lines, |id| (id.as_str() == "a").then(|| Decimal::ONE));
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_line_item_wire_format() {
        let line: LineItem = serde_json::from_str(r#"{"productId":"a","quantity":2}"#).unwrap();
        assert_eq!(line.quantity.get(), 2);
        assert!(serde_json::from_str::<LineItem>(r#"{"productId":"a","quantity":0}"#).is_err());
    }
}
