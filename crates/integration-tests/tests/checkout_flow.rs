//! Integration tests for the cart to order flow.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use elvora_admin::AdminState;
use elvora_core::backend::memory::MemoryBackend;
use elvora_core::{Order, OrderNumber, OrderStatus};
use elvora_integration_tests::{checkout_form, shop};
use elvora_storefront::checkout::CheckoutError;
use elvora_storefront::storage::keys;
use elvora_storefront::{CartStore, Catalog, DeviceId, LocalStore, MemoryStore, OrderSubmission};
use rust_decimal::Decimal;
use serde_json::json;

async fn fill_cart(
    backend: &MemoryBackend,
    store: Arc<MemoryStore>,
) -> CartStore<Arc<MemoryStore>> {
    let catalog = Catalog::new(backend.clone());
    catalog.fetch_all().await;

    let mut cart = CartStore::load(store);
    cart.add(&catalog.get_by_id("1").unwrap(), "M", 2).unwrap();
    cart.add(&catalog.get_by_id("3").unwrap(), "S", 1).unwrap();
    cart
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_first_order_is_numbered_from_base_and_clears_cart() {
    let backend = shop();
    let store = Arc::new(MemoryStore::new());
    let mut cart = fill_cart(&backend, store.clone()).await;
    assert_eq!(cart.total(), Decimal::new(8975, 1));

    let confirmation = OrderSubmission::new(backend.clone())
        .submit(&mut cart, &checkout_form("Amina"))
        .await
        .unwrap();

    assert_eq!(confirmation.order_number, OrderNumber::BASE);
    assert_eq!(confirmation.item_count, 3);
    assert_eq!(confirmation.total, Decimal::new(8975, 1));
    assert!(cart.is_empty());
    assert_eq!(store.get(keys::CART).unwrap(), None);

    let rows = backend.rows("orders");
    assert_eq!(rows.len(), 1);
    let order: Order = serde_json::from_value(rows[0].clone()).unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.customer.country, "Maroc");
    assert_eq!(order.items.len(), 2);
    assert_eq!(
        order.device_id.as_deref(),
        Some(confirmation.device_id.as_str())
    );
}

#[tokio::test]
async fn test_order_numbers_follow_highest_existing() {
    let backend = shop();
    backend.seed(
        "orders",
        vec![json!({
            "id": 9,
            "order_number": 130,
            "customer": {"firstName": "Old", "lastName": "Order", "phone": "0600"},
            "items": [],
            "total": 10,
            "status": "completed",
            "date": "2026-01-01T10:00:00Z"
        })],
    );
    let submission = OrderSubmission::new(backend.clone());

    for (expected, name) in [(131, "Sara"), (132, "Karim")] {
        let mut cart = fill_cart(&backend, Arc::new(MemoryStore::new())).await;
        let confirmation = submission
            .submit(&mut cart, &checkout_form(name))
            .await
            .unwrap();
        assert_eq!(confirmation.order_number, OrderNumber::new(expected));
    }
}

#[tokio::test]
async fn test_order_without_number_is_listed_and_skipped_for_numbering() {
    let backend = shop();
    backend.seed(
        "orders",
        vec![
            json!({
                "id": 1,
                "order_number": 104,
                "customer": {"firstName": "Old", "lastName": "Order"},
                "total": 10,
                "status": "completed",
                "date": "2026-01-01T10:00:00Z"
            }),
            json!({
                "id": 2,
                "order_number": null,
                "customer": {"firstName": "Legacy", "lastName": "Row"},
                "total": 20,
                "status": "pending",
                "date": "2026-01-02T10:00:00Z"
            }),
        ],
    );

    let mut cart = fill_cart(&backend, Arc::new(MemoryStore::new())).await;
    let confirmation = OrderSubmission::new(backend.clone())
        .submit(&mut cart, &checkout_form("Sara"))
        .await
        .unwrap();
    assert_eq!(confirmation.order_number, OrderNumber::new(105));

    let admin = AdminState::new(backend.clone());
    admin.refresh_data().await;
    assert_eq!(admin.orders().len(), 3);
    assert_eq!(admin.order("2").unwrap().order_number, None);
    assert_eq!(admin.search("legacy").len(), 1);
}

#[tokio::test]
async fn test_device_identifier_is_reused_across_orders() {
    let backend = shop();
    let store = Arc::new(MemoryStore::new());
    let submission = OrderSubmission::new(backend.clone());

    let mut cart = fill_cart(&backend, store.clone()).await;
    let first = submission
        .submit(&mut cart, &checkout_form("Amina"))
        .await
        .unwrap();
    let mut cart = fill_cart(&backend, store.clone()).await;
    let second = submission
        .submit(&mut cart, &checkout_form("Amina"))
        .await
        .unwrap();

    assert_eq!(first.device_id, second.device_id);
    assert_eq!(DeviceId::current(&store), Some(first.device_id));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_offline_backend_keeps_cart_for_retry() {
    let backend = shop();
    let store = Arc::new(MemoryStore::new());
    let mut cart = fill_cart(&backend, store.clone()).await;
    backend.set_offline(true);

    let err = OrderSubmission::new(backend.clone())
        .submit(&mut cart, &checkout_form("Amina"))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Backend(_)));
    assert_eq!(cart.item_count(), 3);

    // The cart survives a restart and the retry succeeds
    backend.set_offline(false);
    let mut reloaded = CartStore::load(store);
    assert_eq!(reloaded.item_count(), 3);
    OrderSubmission::new(backend.clone())
        .submit(&mut reloaded, &checkout_form("Amina"))
        .await
        .unwrap();
    assert_eq!(backend.rows("orders").len(), 1);
}

#[tokio::test]
async fn test_invalid_form_never_reaches_backend() {
    let backend = shop();
    let mut cart = fill_cart(&backend, Arc::new(MemoryStore::new())).await;
    let mut form = checkout_form("Amina");
    form.email = "not-an-email".to_string();

    let err = OrderSubmission::new(backend.clone())
        .submit(&mut cart, &form)
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Form(_)));
    assert!(backend.rows("orders").is_empty());
    assert!(!cart.is_empty());
}

#[tokio::test]
async fn test_empty_cart_is_refused() {
    let backend = shop();
    let mut cart = CartStore::load(Arc::new(MemoryStore::new()));
    let err = OrderSubmission::new(backend.clone())
        .submit(&mut cart, &checkout_form("Amina"))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::EmptyCart));
    assert!(backend.rows("orders").is_empty());
}
