//! Orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::cart::CartLine;
use super::wire::null_as_default;
use crate::sync::Record;
use crate::types::{OrderId, OrderNumber, OrderStatus};

/// Contact and shipping details captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl Customer {
    /// "First Last", trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// An order row as read back from the `orders` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Absent on rows written without a number.
    #[serde(default)]
    pub order_number: Option<OrderNumber>,
    pub customer: Customer,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<CartLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    pub date: DateTime<Utc>,
    /// Device that placed the order.
    #[serde(rename = "deviceId", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl Order {
    /// Total number of pieces across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|line| line.quantity).sum()
    }
}

impl Record for Order {
    const TABLE: &'static str = "orders";

    fn key(&self) -> &str {
        self.id.as_str()
    }
}

/// An order about to be inserted; the record identifier is assigned remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer: Customer,
    pub items: Vec<CartLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub date: DateTime<Utc>,
    #[serde(rename = "deviceId")]
    pub device_id: String,
}
