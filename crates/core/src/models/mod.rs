//! Records as they live in the hosted tables.
//!
//! Field names follow the remote column names so that rows decode without a
//! mapping layer. Remote rows are loosely typed; the helpers in [`wire`] turn
//! `null`, empty strings and missing columns into explicit absent values
//! before a record enters the local model.

pub mod cart;
pub mod order;
pub mod product;
pub mod wire;

pub use cart::{CartLine, cart_total};
pub use order::{Customer, NewOrder, Order};
pub use product::{DEFAULT_SIZES, Media, Product, is_video_url};
