//! Orders placed from this device.

use elvora_core::backend::{BackendError, Direction, Query, Realtime, Tables, decode_record, fetch_rows};
use elvora_core::sync::{InsertHook, LiveCollection, Record, Watch, watch_with};
use elvora_core::Order;
use serde_json::Value;
use tracing::instrument;

use crate::device::DeviceId;

/// Column holding the identifier of the ordering device.
const DEVICE_COLUMN: &str = "deviceId";

/// The device's own orders, newest first.
#[derive(Debug)]
pub struct OrderHistory<B> {
    backend: B,
    orders: LiveCollection<Order>,
}

impl<B: Tables> OrderHistory<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            orders: LiveCollection::new(),
        }
    }

    /// Load the orders placed by `device`.
    ///
    /// Without a device identifier nothing was ever ordered from here and
    /// no request is made. A failed request is logged and the previously
    /// loaded list is returned.
    #[instrument(skip_all)]
    pub async fn my_orders(&self, device: Option<&DeviceId>) -> Vec<Order> {
        let Some(device) = device else {
            return Vec::new();
        };

        let query = Query::table(Order::TABLE)
            .eq(DEVICE_COLUMN, device)
            .order_by("date", Direction::Descending);
        match fetch_rows::<Order, _>(&self.backend, &query).await {
            Ok(orders) => self.orders.replace_all(orders),
            Err(e) => tracing::warn!(error = %e, "Could not load order history"),
        }
        self.orders.snapshot()
    }

    /// Orders loaded so far.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.orders.snapshot()
    }

    #[must_use]
    pub const fn collection(&self) -> &LiveCollection<Order> {
        &self.orders
    }
}

impl<B: Tables + Realtime> OrderHistory<B> {
    /// Follow status changes of this device's orders, and pick up new ones.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the subscription cannot be opened.
    pub async fn track(&self, device: &DeviceId) -> Result<Watch, BackendError> {
        let tracker = OrderTracker {
            device_id: device.clone(),
        };
        watch_with(&self.backend, &self.orders, tracker).await
    }
}

/// Admits pushed orders only when they belong to one device.
#[derive(Debug, Clone)]
pub struct OrderTracker {
    device_id: DeviceId,
}

impl InsertHook<Order> for OrderTracker {
    async fn on_insert(&self, payload: Value) -> Option<Order> {
        let order: Order = decode_record(payload)
            .map_err(|e| tracing::warn!(error = %e, "Dropping invalid order push"))
            .ok()?;
        (order.device_id.as_deref() == Some(self.device_id.as_str())).then_some(order)
    }
}
