//! Order submission.
//!
//! Turns the cart and the checkout form into one row of the `orders` table.
//! The flow is:
//!
//! 1. validate the cart and the form (no remote call on failure)
//! 2. make sure the device has an identifier
//! 3. read the highest order number and take the next one
//! 4. insert the order, then clear the cart
//!
//! A failed insert leaves the cart untouched so the customer can retry.
//!
//! Order numbers are computed client-side as "highest + 1". Two devices
//! submitting at the same moment can read the same highest number and both
//! insert it.

use chrono::Utc;
use elvora_core::backend::{BackendError, Direction, Query, Tables, fetch_one};
use elvora_core::sync::Record;
use elvora_core::{Customer, Email, EmailError, NewOrder, Order, OrderNumber, OrderStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::cart::CartStore;
use crate::device::DeviceId;
use crate::storage::LocalStore;

/// Where an empty-cart checkout is sent.
pub const CART_PATH: &str = "/cart";

/// Country preselected on the form.
pub const DEFAULT_COUNTRY: &str = "Maroc";

/// A required form field was left blank or is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

/// Errors aborting a submission.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("Order could not be placed: {0}")]
    Backend(#[from] BackendError),
}

/// Contact and shipping details typed in at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl Default for CheckoutForm {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            postal_code: String::new(),
            country: DEFAULT_COUNTRY.to_string(),
        }
    }
}

impl CheckoutForm {
    /// Check required fields and build the customer snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first blank required field, or an invalid email.
    pub fn validate(&self) -> Result<Customer, FormError> {
        let required = [
            ("First name", &self.first_name),
            ("Last name", &self.last_name),
            ("Email", &self.email),
            ("Phone", &self.phone),
            ("Address", &self.address),
            ("City", &self.city),
            ("Postal code", &self.postal_code),
        ];
        if let Some(&(field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(FormError::MissingField(field));
        }
        let email = Email::parse(&self.email)?;

        let country = self.country.trim();
        Ok(Customer {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: email.as_str().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: if country.is_empty() { DEFAULT_COUNTRY } else { country }.to_string(),
        })
    }
}

/// What the customer is shown after a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub order_number: OrderNumber,
    pub total: Decimal,
    pub item_count: u32,
    pub device_id: DeviceId,
}

/// Whether the checkout page may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutEntry {
    Proceed,
    RedirectToCart,
}

impl CheckoutEntry {
    /// An empty cart redirects to [`CART_PATH`], unless a confirmation for
    /// the order that just emptied it is being shown.
    #[must_use]
    pub const fn decide(cart_is_empty: bool, showing_confirmation: bool) -> Self {
        if cart_is_empty && !showing_confirmation {
            Self::RedirectToCart
        } else {
            Self::Proceed
        }
    }
}

#[derive(Deserialize)]
struct HighestOrder {
    #[serde(default)]
    order_number: Option<OrderNumber>,
}

/// Places orders against the `orders` table.
#[derive(Debug, Clone)]
pub struct OrderSubmission<B> {
    backend: B,
}

impl<B: Tables> OrderSubmission<B> {
    pub const fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The number the next order will get.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the highest number cannot be read.
    pub async fn next_order_number(&self) -> Result<OrderNumber, BackendError> {
        let query = Query::table(Order::TABLE)
            .select("order_number")
            .not_null("order_number")
            .order_by("order_number", Direction::Descending)
            .limit(1);
        let highest: Option<HighestOrder> = fetch_one(&self.backend, &query).await?;
        Ok(OrderNumber::next_after(highest.and_then(|h| h.order_number)))
    }

    /// Submit the cart as a new order.
    ///
    /// On success the cart is cleared and the assigned order number is
    /// returned. On any error the cart is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] or [`CheckoutError::Form`]
    /// before contacting the backend, or [`CheckoutError::Backend`] if the
    /// number lookup or the insert fails.
    #[instrument(skip_all)]
    pub async fn submit<S: LocalStore>(
        &self,
        cart: &mut CartStore<S>,
        form: &CheckoutForm,
    ) -> Result<OrderConfirmation, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let customer = form.validate()?;
        let device_id = DeviceId::ensure(cart.store());

        let order_number = self.next_order_number().await?;
        let order = NewOrder {
            order_number,
            customer,
            items: cart.lines().to_vec(),
            total: cart.total(),
            status: OrderStatus::Pending,
            date: Utc::now(),
            device_id: device_id.as_str().to_string(),
        };
        let row = serde_json::to_value(&order).map_err(BackendError::from)?;

        if let Err(e) = self.backend.insert(Order::TABLE, row).await {
            tracing::error!(error = %e, order_number = %order_number, "Order insert failed");
            return Err(e.into());
        }

        let confirmation = OrderConfirmation {
            order_number,
            total: order.total,
            item_count: cart.item_count(),
            device_id,
        };
        cart.clear();
        tracing::info!(order_number = %order_number, total = %confirmation.total, "Order placed");
        Ok(confirmation)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use elvora_core::Product;
    use elvora_core::backend::memory::MemoryBackend;
    use serde_json::json;

    use super::*;
    use crate::storage::{MemoryStore, keys};

    fn form() -> CheckoutForm {
        CheckoutForm {
            first_name: "Salma".to_string(),
            last_name: "Idrissi".to_string(),
            email: "salma@example.ma".to_string(),
            phone: "0600000000".to_string(),
            address: "12 Rue Atlas".to_string(),
            city: "Rabat".to_string(),
            postal_code: "10000".to_string(),
            ..CheckoutForm::default()
        }
    }

    fn cart_with_one_tee() -> CartStore<MemoryStore> {
        let tee: Product = serde_json::from_value(json!({
            "id": 1, "name": "Tee", "price": 50, "category": "Men"
        }))
        .unwrap();
        let mut cart = CartStore::load(MemoryStore::new());
        cart.add_one(&tee, "M").unwrap();
        cart
    }

    #[test]
    fn test_form_requires_fields_and_valid_email() {
        assert_eq!(
            CheckoutForm::default().validate(),
            Err(FormError::MissingField("First name"))
        );

        let mut bad_email = form();
        bad_email.email = "salma.example.ma".to_string();
        assert!(matches!(
            bad_email.validate(),
            Err(FormError::InvalidEmail(_))
        ));

        let customer = form().validate().unwrap();
        assert_eq!(customer.country, "Maroc");
        assert_eq!(customer.full_name(), "Salma Idrissi");
    }

    #[test]
    fn test_empty_cart_redirects_unless_confirming() {
        assert_eq!(CheckoutEntry::decide(true, false), CheckoutEntry::RedirectToCart);
        assert_eq!(CheckoutEntry::decide(true, true), CheckoutEntry::Proceed);
        assert_eq!(CheckoutEntry::decide(false, false), CheckoutEntry::Proceed);
    }

    #[tokio::test]
    async fn test_first_order_gets_base_number() {
        let backend = MemoryBackend::new();
        let submission = OrderSubmission::new(backend.clone());
        let mut cart = cart_with_one_tee();

        let confirmation = submission.submit(&mut cart, &form()).await.unwrap();

        assert_eq!(confirmation.order_number, OrderNumber::BASE);
        assert_eq!(confirmation.total, Decimal::new(50, 0));
        assert!(cart.is_empty());

        let rows = backend.rows("orders");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["total"], json!(50.0));
        assert_eq!(rows[0]["status"], json!("pending"));
        assert_eq!(rows[0]["deviceId"], json!(confirmation.device_id.as_str()));
        assert_eq!(rows[0]["items"][0]["size"], json!("M"));
    }

    #[tokio::test]
    async fn test_next_number_follows_highest() {
        let backend = MemoryBackend::new();
        backend.seed(
            "orders",
            vec![json!({"order_number": 117}), json!({"order_number": 130}), json!({"order_number": 121})],
        );
        let submission = OrderSubmission::new(backend);

        assert_eq!(
            submission.next_order_number().await.unwrap(),
            OrderNumber::new(131)
        );
    }

    #[tokio::test]
    async fn test_unnumbered_orders_do_not_block_checkout() {
        let backend = MemoryBackend::new();
        backend.seed(
            "orders",
            vec![json!({"order_number": 130}), json!({"order_number": null}), json!({})],
        );
        let submission = OrderSubmission::new(backend.clone());
        let mut cart = cart_with_one_tee();

        let confirmation = submission.submit(&mut cart, &form()).await.unwrap();

        assert_eq!(confirmation.order_number, OrderNumber::new(131));
        assert_eq!(backend.rows("orders").len(), 4);
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_cart() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let submission = OrderSubmission::new(backend.clone());
        let mut cart = cart_with_one_tee();

        let err = submission.submit(&mut cart, &form()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Backend(BackendError::Transport(_))));
        assert_eq!(cart.item_count(), 1);
        assert!(cart.store().get(keys::CART).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_validation_happens_before_remote_calls() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let submission = OrderSubmission::new(backend);

        let mut empty = CartStore::load(MemoryStore::new());
        assert!(matches!(
            submission.submit(&mut empty, &form()).await,
            Err(CheckoutError::EmptyCart)
        ));

        let mut cart = cart_with_one_tee();
        assert!(matches!(
            submission.submit(&mut cart, &CheckoutForm::default()).await,
            Err(CheckoutError::Form(FormError::MissingField(_)))
        ));
    }
}
