//! Catalog product type.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Subcategory label used when a product has none.
pub const DEFAULT_SUBCATEGORY: &str = "Other";

/// A product as served by the catalog service.
///
/// Read-only on the client. Field names follow the wire format
/// (`_id`, `oldPrice`, `outOfStock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_price: Option<Decimal>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub out_of_stock: bool,
}

impl Product {
    /// Subcategory used for grouping, falling back to [`DEFAULT_SUBCATEGORY`].
    #[must_use]
    pub fn subcategory_or_default(&self) -> &str {
        self.subcategory
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SUBCATEGORY)
    }

    /// Whether the product shows a struck-through previous price.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        self.old_price.is_some_and(|old| old > self.price)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_wire_product() {
        let json = r#"{
            "_id": "p1",
            "name": "Milk 1L",
            "description": "fresh whole milk",
            "category": "Dairy",
            "price": 1.5,
            "oldPrice": "2.00",
            "image": "milk.png",
            "outOfStock": true
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.price, Decimal::new(15, 1));
        assert_eq!(product.old_price, Some(Decimal::new(200, 2)));
        assert!(product.out_of_stock);
        assert!(product.is_discounted());
        assert_eq!(product.subcategory_or_default(), DEFAULT_SUBCATEGORY);
    }

    #[test]
    fn test_deserialize_minimal_product() {
        let product: Product =
            serde_json::from_str(r#"{"id": "p2", "name": "Bread", "price": 3}"#).unwrap();
        assert_eq!(product.description, "");
        assert!(!product.out_of_stock);
        assert!(!product.is_discounted());
    }

    #[test]
    fn test_blank_subcategory_falls_back() {
        let product: Product = serde_json::from_str(
            r#"{"_id": "p3", "name": "Oats", "price": 2, "subcategory": "  "}"#,
        )
        .unwrap();
        assert_eq!(product.subcategory_or_default(), "Other");
    }
}
