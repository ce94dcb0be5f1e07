//! Persistent cart.
//!
//! The cart lives entirely on the device. Every mutation rewrites the whole
//! line set under [`keys::CART`]; loading never fails, a missing or corrupt
//! record simply yields an empty cart.

use elvora_core::{CartLine, Product, cart_total};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::storage::{LocalStore, keys};

/// Cart validation errors, raised before anything is stored.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Please select a size")]
    MissingSize,
}

/// The shopping cart, mirrored to local storage.
#[derive(Debug)]
pub struct CartStore<S> {
    store: S,
    lines: Vec<CartLine>,
}

impl<S: LocalStore> CartStore<S> {
    /// Restore the cart saved in `store`.
    pub fn load(store: S) -> Self {
        let lines = match store.get(keys::CART) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<CartLine>>(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding unreadable saved cart");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read saved cart");
                Vec::new()
            }
        };
        let lines = lines.into_iter().filter(|l| l.quantity >= 1).collect();
        Self { store, lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Add `quantity` pieces of `product` in `size`.
    ///
    /// An existing `(product, size)` line is incremented; otherwise a new
    /// line is appended. A quantity of zero counts as one. Any non-blank
    /// size is accepted, listed on the product or not.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::MissingSize`] if no size is given.
    pub fn add(&mut self, product: &Product, size: &str, quantity: u32) -> Result<(), CartError> {
        let size = size.trim();
        if size.is_empty() {
            return Err(CartError::MissingSize);
        }

        let quantity = quantity.max(1);
        match self
            .lines
            .iter_mut()
            .find(|line| line.is(product.id.as_str(), size))
        {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self
                .lines
                .push(CartLine::from_product(product, size, quantity)),
        }
        self.persist();
        Ok(())
    }

    /// Add a single piece.
    ///
    /// # Errors
    ///
    /// See [`CartStore::add`].
    pub fn add_one(&mut self, product: &Product, size: &str) -> Result<(), CartError> {
        self.add(product, size, 1)
    }

    /// Remove the `(product_id, size)` line, if present.
    pub fn remove(&mut self, product_id: &str, size: &str) {
        self.lines.retain(|line| !line.is(product_id, size));
        self.persist();
    }

    /// Set the quantity of the `(product_id, size)` line.
    ///
    /// Quantities below one are ignored and leave the line unchanged.
    pub fn update_quantity(&mut self, product_id: &str, size: &str, quantity: u32) {
        if quantity < 1 {
            return;
        }
        if let Some(line) = self.lines.iter_mut().find(|l| l.is(product_id, size)) {
            line.quantity = quantity;
        }
        self.persist();
    }

    /// Empty the cart and erase the saved record.
    pub fn clear(&mut self) {
        self.lines.clear();
        if let Err(e) = self.store.remove(keys::CART) {
            tracing::warn!(error = %e, "Could not erase saved cart");
        }
    }

    /// Sum of price × quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        cart_total(&self.lines)
    }

    /// Number of pieces in the cart.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn persist(&self) {
        let saved = serde_json::to_string(&self.lines)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                self.store
                    .set(keys::CART, &raw)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = saved {
            tracing::warn!(error = %e, "Could not save cart");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use elvora_core::Category;
    use serde_json::json;

    use super::*;
    use crate::storage::MemoryStore;

    fn product(id: i64, price: i64) -> Product {
        serde_json::from_value(json!({
            "id": id,
            "name": format!("Product {id}"),
            "price": price,
            "category": "Men",
            "sizes": ["S", "M", "L"],
        }))
        .unwrap()
    }

    #[test]
    fn test_same_product_and_size_accumulates() {
        let mut cart = CartStore::load(MemoryStore::new());
        let tee = product(1, 50);

        for quantity in [1, 2, 4] {
            cart.add(&tee, "M", quantity).unwrap();
        }

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.item_count(), 7);
        assert_eq!(cart.total(), Decimal::new(350, 0));
    }

    #[test]
    fn test_sizes_are_separate_lines() {
        let mut cart = CartStore::load(MemoryStore::new());
        let tee = product(1, 50);
        cart.add_one(&tee, "M").unwrap();
        cart.add_one(&tee, "L").unwrap();
        cart.add(&tee, "S", 0).unwrap();

        assert_eq!(cart.lines().len(), 3);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.lines()[0].category, Some(Category::Men));
    }

    #[test]
    fn test_size_is_required() {
        let mut cart = CartStore::load(MemoryStore::new());
        let tee = product(1, 50);

        assert_eq!(cart.add_one(&tee, " "), Err(CartError::MissingSize));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_size_outside_product_list_is_accepted() {
        let mut cart = CartStore::load(MemoryStore::new());
        let tee: Product = serde_json::from_value(json!({
            "id": 7, "name": "Tee", "price": 60, "category": "Women", "sizes": ["M", "L"]
        }))
        .unwrap();

        cart.add_one(&tee, "S").unwrap();
        assert!(cart.lines()[0].is("7", "S"));
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_update_below_one_is_a_no_op() {
        let mut cart = CartStore::load(MemoryStore::new());
        cart.add(&product(1, 50), "M", 3).unwrap();
        let before = cart.lines().to_vec();

        cart.update_quantity("1", "M", 0);
        assert_eq!(cart.lines(), before.as_slice());

        cart.update_quantity("1", "M", 5);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_remove_only_matching_line() {
        let mut cart = CartStore::load(MemoryStore::new());
        cart.add_one(&product(1, 50), "M").unwrap();
        cart.add_one(&product(2, 80), "M").unwrap();

        cart.remove("1", "L");
        assert_eq!(cart.lines().len(), 2);
        cart.remove("1", "M");
        assert_eq!(cart.lines().len(), 1);
        assert!(cart.lines()[0].is("2", "M"));
    }

    #[test]
    fn test_survives_reload_and_clear_erases_record() {
        let store = MemoryStore::new();
        let mut cart = CartStore::load(store.clone());
        cart.add(&product(1, 50), "M", 2).unwrap();
        cart.add_one(&product(2, 80), "S").unwrap();

        let reloaded = CartStore::load(store.clone());
        assert_eq!(reloaded.lines(), cart.lines());

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(store.get(keys::CART).unwrap(), None);
    }

    #[test]
    fn test_corrupt_record_yields_empty_cart() {
        let store = MemoryStore::new();
        store.set(keys::CART, "{not json").unwrap();

        let cart = CartStore::load(store);
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
    }
}
