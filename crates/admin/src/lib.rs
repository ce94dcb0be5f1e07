//! Elvora admin library.
//!
//! The back-office side of the shop:
//! - [`session`] - the admin session and the gate in front of admin views
//! - [`state`] - realtime mirrors of the `orders` and `products` tables
//! - [`products`] - catalog management with media upload
//! - [`orders`] - order status changes, deletion, search and counters
//!
//! # Security
//!
//! Every write here runs with the signed-in admin's credentials. Callers must
//! check [`session::AdminSession::gate`] before exposing any of it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod orders;
pub mod products;
pub mod session;
pub mod state;

pub use error::AdminError;
pub use orders::{OrderStats, search_orders};
pub use products::{MAX_GALLERY_IMAGES, MediaFile, ProductDraft};
pub use session::{AdminSession, GateDecision, LOGIN_PATH, SessionState};
pub use state::AdminState;
