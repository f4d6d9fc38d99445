//! Cart state: lines keyed by product, derived totals, and the merge rule.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::Product;

/// One product in a cart with its quantity.
///
/// Invariant: `quantity >= 1`. A quantity reaching zero means the line is
/// removed, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Snapshot of the product at the time it entered the cart.
    pub product: Product,
    /// Number of units, at least 1.
    pub quantity: u32,
}

impl CartLine {
    /// Create a line for `quantity` units of `product`.
    #[must_use]
    pub const fn new(product: Product, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// Line total: quantity times the discounted unit price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.product.unit_price()
    }
}

/// A cart: an order-irrelevant set of lines, unique per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// The cart lines. At most one line per product id.
    pub items: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line for `product_id`, if present.
    #[must_use]
    pub fn line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.items.iter().find(|line| &line.product.id == product_id)
    }

    /// Quantity currently in the cart for `product_id` (0 if absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> u32 {
        self.line(product_id).map_or(0, |line| line.quantity)
    }

    /// Set the quantity for an existing line. Returns `false` when no line
    /// for `product_id` exists. A `quantity` of 0 removes the line.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }
        match self
            .items
            .iter_mut()
            .find(|line| &line.product.id == product_id)
        {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove the line for `product_id`. Returns `false` if it was absent.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|line| &line.product.id != product_id);
        self.items.len() != before
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Total price across all lines, using the discounted unit price rule.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// Merge incoming lines into this cart.
    ///
    /// For each incoming line: an existing line for the same product has the
    /// quantities summed; an unknown product is appended as a new line. No
    /// stock clamping happens here - that is the remote cart's own invariant
    /// enforcement, applied independently. The result is independent of the
    /// ordering of `incoming`.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = CartLine>) {
        for line in incoming {
            match self
                .items
                .iter_mut()
                .find(|existing| existing.product.id == line.product.id)
            {
                Some(existing) => existing.quantity += line.quantity,
                None => self.items.push(line),
            }
        }
    }
}
