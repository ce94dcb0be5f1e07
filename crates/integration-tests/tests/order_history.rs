//! Integration tests for the device's order history.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use elvora_core::backend::Tables;
use elvora_core::backend::memory::MemoryBackend;
use elvora_core::{OrderNumber, OrderStatus};
use elvora_integration_tests::{checkout_form, settle, shop};
use elvora_storefront::{
    CartStore, Catalog, DeviceId, MemoryStore, OrderConfirmation, OrderHistory, OrderSubmission,
};
use serde_json::json;

async fn place_order(backend: &MemoryBackend, store: Arc<MemoryStore>, name: &str) -> OrderConfirmation {
    let catalog = Catalog::new(backend.clone());
    catalog.fetch_all().await;
    let mut cart = CartStore::load(store);
    cart.add(&catalog.get_by_id("2").unwrap(), "L", 1).unwrap();
    OrderSubmission::new(backend.clone())
        .submit(&mut cart, &checkout_form(name))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fresh_device_has_no_history() {
    let backend = shop();
    let store = MemoryStore::new();
    let history = OrderHistory::new(backend);

    let device = DeviceId::current(&store);
    assert_eq!(device, None);
    assert!(history.my_orders(device.as_ref()).await.is_empty());
}

#[tokio::test]
async fn test_lists_only_orders_from_this_device() {
    let backend = shop();
    let mine = Arc::new(MemoryStore::new());
    let theirs = Arc::new(MemoryStore::new());

    place_order(&backend, mine.clone(), "Amina").await;
    place_order(&backend, theirs.clone(), "Karim").await;
    place_order(&backend, mine.clone(), "Amina").await;

    let history = OrderHistory::new(backend.clone());
    let orders = history.my_orders(DeviceId::current(&mine).as_ref()).await;

    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.customer.first_name == "Amina"));
    let numbers: Vec<_> = orders.iter().map(|o| o.order_number).collect();
    assert!(numbers.contains(&Some(OrderNumber::new(100))));
    assert!(numbers.contains(&Some(OrderNumber::new(102))));
}

#[tokio::test]
async fn test_tracking_follows_status_and_new_orders() {
    let backend = shop();
    let mine = Arc::new(MemoryStore::new());
    let theirs = Arc::new(MemoryStore::new());
    let first = place_order(&backend, mine.clone(), "Amina").await;

    let history = OrderHistory::new(backend.clone());
    history.my_orders(Some(&first.device_id)).await;
    let watch = history.track(&first.device_id).await.unwrap();

    // An admin ships the order
    let id = history.orders()[0].id.clone();
    backend
        .update("orders", id.as_str(), json!({"status": "shipped"}))
        .await
        .unwrap();
    assert!(
        settle(history.collection(), |orders| {
            orders.first().is_some_and(|o| o.status == OrderStatus::Shipped)
        })
        .await
    );

    // Another device's order stays out, a second order of ours comes in
    place_order(&backend, theirs, "Karim").await;
    let second = place_order(&backend, mine, "Amina").await;
    assert!(
        settle(history.collection(), |orders| {
            orders.iter().any(|o| o.order_number == Some(second.order_number))
        })
        .await
    );
    assert_eq!(history.orders().len(), 2);
    assert!(
        history
            .orders()
            .iter()
            .all(|o| o.device_id.as_deref() == Some(first.device_id.as_str()))
    );

    watch.close().await;
    assert_eq!(backend.subscriber_count("orders"), 0);
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_list() {
    let backend = shop();
    let store = Arc::new(MemoryStore::new());
    let confirmation = place_order(&backend, store, "Amina").await;

    let history = OrderHistory::new(backend.clone());
    assert_eq!(history.my_orders(Some(&confirmation.device_id)).await.len(), 1);

    backend.set_offline(true);
    let orders = history.my_orders(Some(&confirmation.device_id)).await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_number, Some(confirmation.order_number));
}
