//! Product snapshot carried on cart and wishlist lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::discounted_unit_price;

/// The slice of a catalog product that cart state needs to reason about.
///
/// This is a snapshot taken when the product entered the cart, not a live
/// catalog record. Stock is only consulted for anonymous-mode clamping; in
/// authenticated mode the server re-checks it on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Backend identifier for the product.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price in the store currency's standard unit.
    pub price: Decimal,
    /// Discount in whole percent (0 means no discount).
    #[serde(default)]
    pub discount: u32,
    /// Units currently in stock.
    pub stock: u32,
}

impl Product {
    /// Effective unit price with the product's discount applied.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        discounted_unit_price(self.price, self.discount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, discount: u32) -> Product {
        Product {
            id: ProductId::new("p-1"),
            name: "Ceramic mug".to_owned(),
            price: Decimal::from(price),
            discount,
            stock: 10,
        }
    }

    #[test]
    fn test_unit_price_applies_discount() {
        assert_eq!(product(1000, 10).unit_price(), Decimal::from(900));
        assert_eq!(product(500, 0).unit_price(), Decimal::from(500));
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let json = serde_json::to_value(product(500, 0)).unwrap();
        assert_eq!(json["id"], "p-1");
        assert!(json.get("discount").is_some());
    }
}
