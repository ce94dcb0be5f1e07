//! Command implementations.
//!
//! - [`shop`] - catalog, cart, checkout and the device's orders
//! - [`admin`] - back-office commands behind the admin session gate

pub mod admin;
pub mod shop;

use std::io::Write;
use std::sync::Arc;

use elvora_core::{Order, Price, Product};
use elvora_storefront::FileStore;

use crate::config::CliConfig;
use crate::error::CliError;
use crate::supabase::SupabaseClient;

/// Everything a command needs: the backend client and local storage.
pub struct Context {
    pub client: SupabaseClient,
    pub store: Arc<FileStore>,
    pub media_bucket: String,
}

impl Context {
    /// Open the local store and build the backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the
    /// HTTP client cannot be built.
    pub fn new(config: &CliConfig) -> Result<Self, CliError> {
        let store = Arc::new(FileStore::open(&config.data_dir)?);
        let client = SupabaseClient::new(
            config.supabase_url.clone(),
            config.anon_key.clone(),
            store.clone(),
        )?;
        Ok(Self {
            client,
            store,
            media_bucket: config.media_bucket.clone(),
        })
    }
}

fn write_product_line(out: &mut impl Write, product: &Product) -> std::io::Result<()> {
    writeln!(
        out,
        "#{:<6} {:<32} {:>12}  {:<6} {}",
        product.id,
        product.name,
        product.price().to_string(),
        product.category,
        product.product_type.as_deref().unwrap_or("-"),
    )
}

fn write_order_line(out: &mut impl Write, order: &Order) -> std::io::Result<()> {
    writeln!(
        out,
        "#{:<6} {}  {:<24} {:<16} {:>12}  {}",
        order
            .order_number
            .map_or_else(|| "-".to_string(), |n| n.to_string()),
        order.date.format("%Y-%m-%d %H:%M"),
        order.customer.full_name(),
        order.customer.phone,
        Price::mad(order.total).to_string(),
        order.status.label(),
    )
}
