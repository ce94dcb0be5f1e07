//! Errors reported by CLI commands.

use elvora_admin::AdminError;
use elvora_core::backend::BackendError;
use elvora_storefront::checkout::CheckoutError;
use elvora_storefront::{CartError, StorageError};
use thiserror::Error;

use crate::config::ConfigError;

/// Everything a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Local storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Not in cart: product {product} in size {size}")]
    NotInCart { product: String, size: String },

    /// The admin gate sent the request to the login page.
    #[error("Sign in required to open {from}; run `elvora admin login`")]
    SignInRequired { from: String },

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

impl CliError {
    /// Whether the failure came from the hosted backend and should be
    /// reported to error tracking.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        match self {
            Self::Backend(_) | Self::Checkout(CheckoutError::Backend(_)) => true,
            Self::Admin(e) => e.is_remote(),
            _ => false,
        }
    }
}
