//! Integration tests for Elvora.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p elvora-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - cart to order, numbering and failure handling
//! - `order_history` - device-scoped order lists and live status
//! - `admin_mirror` - realtime mirrors fed by storefront activity
//! - `admin_session` - the admin gate and catalog management
//!
//! Every test runs the storefront and admin libraries against one shared
//! [`MemoryBackend`], standing in for the hosted service.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use elvora_core::backend::memory::MemoryBackend;
use elvora_core::sync::{LiveCollection, Record};
use elvora_storefront::CheckoutForm;
use serde_json::{Value, json};

/// Upper bound for realtime propagation in tests.
pub const PROPAGATION_TIMEOUT: Duration = Duration::from_secs(2);

/// A product row as stored remotely.
#[must_use]
pub fn product_row(id: i64, name: &str, price: f64, category: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "price": price,
        "category": category,
        "type": "Topwear",
        "image": format!("https://cdn.elvora.ma/{id}.jpg"),
        "gallery": [],
        "description": "",
        "sizes": ["S", "M", "L", "XL"],
    })
}

/// A backend seeded with a small catalog.
#[must_use]
pub fn shop() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.seed(
        "products",
        vec![
            product_row(1, "Linen Shirt", 349.0, "Men"),
            product_row(2, "Kaftan Dress", 520.0, "Women"),
            product_row(3, "Hoodie", 199.5, "Kids"),
        ],
    );
    backend
}

/// A complete checkout form.
#[must_use]
pub fn checkout_form(first_name: &str) -> CheckoutForm {
    CheckoutForm {
        first_name: first_name.to_string(),
        last_name: "Berrada".to_string(),
        email: format!("{}@mail.ma", first_name.to_lowercase()),
        phone: "0611223344".to_string(),
        address: "12 rue Atlas".to_string(),
        city: "Rabat".to_string(),
        postal_code: "10000".to_string(),
        ..CheckoutForm::default()
    }
}

/// Wait until `check` holds for `collection`.
///
/// Returns `false` if it does not within [`PROPAGATION_TIMEOUT`].
pub async fn settle<T: Record>(
    collection: &LiveCollection<T>,
    check: impl Fn(&[T]) -> bool,
) -> bool {
    let mut changes = collection.changes();
    tokio::time::timeout(PROPAGATION_TIMEOUT, async {
        while !collection.with_items(&check) {
            if changes.changed().await.is_err() {
                return false;
            }
        }
        true
    })
    .await
    .unwrap_or(false)
}
