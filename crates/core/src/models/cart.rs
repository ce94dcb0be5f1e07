//! Cart lines.
//!
//! A cart line is also the item snapshot stored on an order: name, price and
//! image are copied from the product when the line is created and never
//! re-joined afterwards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::Product;
use super::wire::null_as_default;
use crate::types::{Category, ProductId};

/// One product + size selection with its quantity.
///
/// Lines are unique per `(product_id, size)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub size: String,
    pub quantity: u32,
}

impl CartLine {
    /// Snapshot `product` into a new line.
    #[must_use]
    pub fn from_product(product: &Product, size: &str, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            category: Some(product.category),
            size: size.to_string(),
            quantity,
        }
    }

    /// Whether this line is the `(product_id, size)` selection.
    #[must_use]
    pub fn is(&self, product_id: &str, size: &str) -> bool {
        self.product_id.matches(product_id) && self.size == size
    }

    /// Price × quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Sum of every line's price × quantity. No tax or shipping.
#[must_use]
pub fn cart_total(lines: &[CartLine]) -> Decimal {
    lines.iter().map(CartLine::line_total).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_total_is_sum_of_line_totals() {
        let lines: Vec<CartLine> = serde_json::from_value(json!([
            {"id": 1, "name": "Tee", "price": 64, "size": "M", "quantity": 2},
            {"id": 2, "name": "Bomber", "price": 82.5, "size": "L", "quantity": 1},
        ]))
        .unwrap();

        assert_eq!(cart_total(&lines), Decimal::new(2105, 1));
        assert_eq!(cart_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_decodes_legacy_line_with_full_product_fields() {
        // Older carts stored the whole product next to size and quantity
        let line: CartLine = serde_json::from_value(json!({
            "id": "7",
            "name": "Dress",
            "price": 300,
            "originalPrice": 420,
            "category": "Women",
            "image": "https://cdn/dress.jpg",
            "sizes": ["S", "M"],
            "size": "S",
            "quantity": 1,
        }))
        .unwrap();

        assert!(line.is("7", "S"));
        assert!(!line.is("7", "M"));
        assert_eq!(line.category, Some(Category::Women));
    }
}
