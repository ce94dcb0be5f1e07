//! Admin application state.
//!
//! Holds the admin's mirrors of the `orders` and `products` tables. The
//! mirrors are loaded by [`AdminState::refresh_data`] and kept current by
//! the realtime watches opened in [`AdminState::mount`]; they reflect the
//! admin's own writes only once the backend echoes them back.

use elvora_core::backend::{
    Backend, BackendError, Direction, Query, Tables, fetch_one, fetch_rows,
};
use elvora_core::sync::{InsertHook, InsertPolicy, LiveCollection, Record, Watch, watch, watch_with};
use elvora_core::{Order, Product, record_key};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;

/// Bucket receiving product media unless configured otherwise.
pub const DEFAULT_MEDIA_BUCKET: &str = "product-media";

/// Shared admin state.
#[derive(Debug)]
pub struct AdminState<B> {
    pub(crate) backend: B,
    pub(crate) media_bucket: String,
    orders: LiveCollection<Order>,
    products: LiveCollection<Product>,
    watches: Mutex<Vec<Watch>>,
}

impl<B> AdminState<B>
where
    B: Backend + Clone + 'static,
{
    /// Empty mirrors over `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            media_bucket: DEFAULT_MEDIA_BUCKET.to_string(),
            orders: LiveCollection::with_policy(InsertPolicy::ReplaceById),
            products: LiveCollection::new(),
            watches: Mutex::new(Vec::new()),
        }
    }

    /// Upload product media to `bucket` instead of the default one.
    #[must_use]
    pub fn with_media_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.media_bucket = bucket.into();
        self
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Load both mirrors and start following remote changes.
    ///
    /// # Errors
    ///
    /// Returns the backend error if a realtime channel cannot be opened.
    /// Already opened channels are closed again.
    #[instrument(skip(self))]
    pub async fn mount(&self) -> Result<(), BackendError> {
        self.refresh_data().await;

        let products = watch(&self.backend, &self.products).await?;
        let orders = match watch_with(&self.backend, &self.orders, RefetchOrder::new(self.backend.clone())).await {
            Ok(handle) => handle,
            Err(e) => {
                products.close().await;
                return Err(e);
            }
        };
        self.watches.lock().await.extend([products, orders]);
        tracing::info!("Admin mirrors mounted");
        Ok(())
    }

    /// Close every realtime channel opened by [`AdminState::mount`].
    pub async fn unmount(&self) {
        let watches: Vec<Watch> = self.watches.lock().await.drain(..).collect();
        for handle in watches {
            handle.close().await;
        }
    }

    /// Whether realtime channels are open.
    pub async fn is_mounted(&self) -> bool {
        !self.watches.lock().await.is_empty()
    }
}

impl<B: Tables> AdminState<B> {
    /// Re-fetch orders (newest first by date) and products (newest first by
    /// identifier). A failed fetch keeps that mirror as it was.
    #[instrument(skip(self))]
    pub async fn refresh_data(&self) {
        let orders = Query::table(Order::TABLE).order_by("date", Direction::Descending);
        match fetch_rows::<Order, _>(&self.backend, &orders).await {
            Ok(rows) => self.orders.replace_all(rows),
            Err(e) => tracing::warn!(error = %e, "Could not load orders"),
        }

        let products = Query::table(Product::TABLE).order_by("id", Direction::Descending);
        match fetch_rows::<Product, _>(&self.backend, &products).await {
            Ok(rows) => self.products.replace_all(rows),
            Err(e) => tracing::warn!(error = %e, "Could not load products"),
        }
    }

    /// Every mirrored order.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.orders.snapshot()
    }

    /// Every mirrored product.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.products.snapshot()
    }

    /// Mirrored order with identifier `id`, compared as text.
    #[must_use]
    pub fn order(&self, id: &str) -> Option<Order> {
        self.orders.get(id.trim())
    }

    /// Mirrored product with identifier `id`, compared as text.
    #[must_use]
    pub fn product(&self, id: &str) -> Option<Product> {
        self.products.get(id.trim())
    }

    #[must_use]
    pub const fn orders_collection(&self) -> &LiveCollection<Order> {
        &self.orders
    }

    #[must_use]
    pub const fn products_collection(&self) -> &LiveCollection<Product> {
        &self.products
    }
}

/// Re-reads a pushed order by identifier before it enters the mirror.
///
/// Insert pushes may lack joined data; the stored row is authoritative.
#[derive(Debug, Clone)]
pub struct RefetchOrder<B> {
    backend: B,
}

impl<B> RefetchOrder<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }
}

impl<B: Tables + 'static> InsertHook<Order> for RefetchOrder<B> {
    async fn on_insert(&self, payload: Value) -> Option<Order> {
        let id = record_key(&payload)?;
        let query = Query::table(Order::TABLE).select("*").eq("id", &id);
        match fetch_one::<Order, _>(&self.backend, &query).await {
            Ok(Some(order)) => Some(order),
            Ok(None) => {
                tracing::debug!(order_id = %id, "Pushed order vanished before re-fetch");
                None
            }
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "Could not re-fetch pushed order");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use elvora_core::backend::memory::MemoryBackend;
    use elvora_core::backend::{ChangeEvent, Tables};
    use serde_json::json;

    use super::*;

    fn order_row(id: i64, date: &str) -> Value {
        json!({
            "id": id,
            "order_number": 99 + id,
            "customer": {"firstName": "Yassine", "lastName": "Tazi", "phone": "0622"},
            "items": [],
            "total": 75,
            "status": "pending",
            "date": date,
            "deviceId": "dev_a"
        })
    }

    async fn until(collection: &LiveCollection<Order>, check: impl Fn(&[Order]) -> bool) {
        let mut changes = collection.changes();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !collection.with_items(&check) {
                changes.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_refresh_orders_by_date() {
        let backend = MemoryBackend::new();
        backend.seed(
            "orders",
            vec![order_row(1, "2026-03-01T08:00:00Z"), order_row(2, "2026-03-02T08:00:00Z")],
        );
        let state = AdminState::new(backend.clone());
        state.refresh_data().await;

        let keys: Vec<String> = state.orders().iter().map(|o| o.key().to_string()).collect();
        assert_eq!(keys, vec!["2", "1"]);
        assert!(state.order("1").is_some());

        backend.set_offline(true);
        state.refresh_data().await;
        assert_eq!(state.orders().len(), 2);
    }

    #[tokio::test]
    async fn test_inserted_order_is_refetched_from_table() {
        let backend = MemoryBackend::new();
        let state = AdminState::new(backend.clone());
        state.mount().await.unwrap();

        // Row exists remotely, push carries only the key
        backend.seed("orders", vec![order_row(7, "2026-03-03T08:00:00Z")]);
        backend.emit(ChangeEvent::insert("orders", json!({"id": 7})));

        until(state.orders_collection(), |orders| orders.len() == 1).await;
        assert_eq!(state.order("7").unwrap().customer.first_name, "Yassine");

        state.unmount().await;
        assert!(!state.is_mounted().await);
        assert_eq!(backend.subscriber_count("orders"), 0);
        assert_eq!(backend.subscriber_count("products"), 0);
    }

    #[tokio::test]
    async fn test_repeated_order_insert_is_deduplicated() {
        let backend = MemoryBackend::new();
        let state = AdminState::new(backend.clone());
        state.mount().await.unwrap();

        backend.insert("orders", order_row(3, "2026-03-03T08:00:00Z")).await.unwrap();
        backend.emit(ChangeEvent::insert("orders", json!({"id": 3})));
        backend
            .update("orders", "3", json!({"status": "completed"}))
            .await
            .unwrap();

        until(state.orders_collection(), |orders| {
            orders.len() == 1 && orders.iter().all(|o| o.status == elvora_core::OrderStatus::Completed)
        })
        .await;
        state.unmount().await;
    }

    #[tokio::test]
    async fn test_mount_failure_leaves_nothing_open() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let state = AdminState::new(backend.clone());

        assert!(state.mount().await.is_err());
        assert!(!state.is_mounted().await);
        assert_eq!(backend.subscriber_count("products"), 0);
    }
}
