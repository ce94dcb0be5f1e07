//! Order desk: status changes, deletion, search and counters.

use elvora_core::backend::{BackendError, Tables};
use elvora_core::sync::Record;
use elvora_core::{Order, OrderStatus};
use serde_json::json;
use tracing::instrument;

use crate::error::AdminError;
use crate::state::AdminState;

/// Dashboard counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
}

impl OrderStats {
    #[must_use]
    pub fn of(orders: &[Order]) -> Self {
        let count = |status| orders.iter().filter(|o| o.status == status).count();
        Self {
            total: orders.len(),
            pending: count(OrderStatus::Pending),
            completed: count(OrderStatus::Completed),
        }
    }
}

/// Orders whose customer name, order number or phone contains `term`.
///
/// Name and number match case-insensitively; an empty term matches all.
#[must_use]
pub fn search_orders(orders: &[Order], term: &str) -> Vec<Order> {
    let needle = term.trim().to_lowercase();
    orders
        .iter()
        .filter(|order| {
            order.customer.full_name().to_lowercase().contains(&needle)
                || order
                    .order_number
                    .is_some_and(|n| n.to_string().contains(&needle))
                || order.customer.phone.contains(&needle)
        })
        .cloned()
        .collect()
}

impl<B: Tables> AdminState<B> {
    /// Move order `id` to `status`.
    ///
    /// The mirror is updated when the backend echoes the change.
    ///
    /// # Errors
    ///
    /// Returns the backend error, after logging it.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
    ) -> Result<(), AdminError> {
        self.backend
            .update(Order::TABLE, id.trim(), json!({ "status": status }))
            .await
            .map_err(|e| log_failure(e, "Order status update failed"))?;
        tracing::info!("Order status updated");
        Ok(())
    }

    /// Delete order `id`.
    ///
    /// # Errors
    ///
    /// Returns the backend error, after logging it.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: &str) -> Result<(), AdminError> {
        self.backend
            .delete(Order::TABLE, id.trim())
            .await
            .map_err(|e| log_failure(e, "Order deletion failed"))?;
        tracing::info!("Order deleted");
        Ok(())
    }

    /// Mirrored orders matching `term`, see [`search_orders`].
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<Order> {
        self.orders_collection()
            .with_items(|orders| search_orders(orders, term))
    }

    /// Counters over the mirrored orders.
    #[must_use]
    pub fn stats(&self) -> OrderStats {
        self.orders_collection().with_items(OrderStats::of)
    }
}

fn log_failure(e: BackendError, message: &str) -> AdminError {
    tracing::error!(error = %e, "{message}");
    AdminError::Backend(e)
}
