//! Core types for Elvora.
//!
//! Type-safe wrappers for the domain concepts shared by storefront and admin.

pub mod category;
pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use category::{ALL_CATEGORIES, Category, CategoryError};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use status::*;
