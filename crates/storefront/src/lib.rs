//! Elvora storefront library.
//!
//! Client-side state of the shop: the persistent cart, the product catalog
//! cache, order submission and the device's order history. Everything here
//! is generic over the backend traits in [`elvora_core::backend`] and over a
//! [`storage::LocalStore`] for durable local state.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod device;
pub mod history;
pub mod storage;

pub use cart::{CartError, CartStore};
pub use catalog::{BrowseFilter, Catalog, SortBy};
pub use checkout::{CheckoutError, CheckoutForm, OrderConfirmation, OrderSubmission};
pub use device::DeviceId;
pub use history::{OrderHistory, OrderTracker};
pub use storage::{FileStore, LocalStore, MemoryStore, StorageError};
