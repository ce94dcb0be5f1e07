//! Product catalog cache.
//!
//! Read-through copy of the `products` table, newest first. A failed fetch
//! keeps whatever was loaded before; the catalog is never emptied because
//! the backend is unreachable.

use std::sync::atomic::{AtomicBool, Ordering};

use elvora_core::backend::{BackendError, Direction, Query, Realtime, Tables, fetch_rows};
use elvora_core::sync::{LiveCollection, Record, Watch, watch};
use elvora_core::{ALL_CATEGORIES, Category, Product};
use tracing::instrument;

/// Maximum number of related products shown next to a product.
pub const MAX_RELATED: usize = 4;

/// Listing order for [`Catalog::browse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Catalog order (newest first).
    #[default]
    Relevant,
    PriceLow,
    PriceHigh,
}

/// Category and type constraints for a listing. Empty sets do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseFilter {
    pub categories: Vec<Category>,
    pub types: Vec<String>,
    pub sort: SortBy,
}

impl BrowseFilter {
    /// Add `category` if absent, remove it otherwise.
    pub fn toggle_category(&mut self, category: Category) {
        if let Some(pos) = self.categories.iter().position(|c| *c == category) {
            self.categories.remove(pos);
        } else {
            self.categories.push(category);
        }
    }

    /// Add `product_type` if absent, remove it otherwise.
    pub fn toggle_type(&mut self, product_type: &str) {
        if let Some(pos) = self.types.iter().position(|t| t == product_type) {
            self.types.remove(pos);
        } else {
            self.types.push(product_type.to_string());
        }
    }

    fn admits(&self, product: &Product) -> bool {
        let category_ok = self.categories.is_empty() || self.categories.contains(&product.category);
        let type_ok = self.types.is_empty()
            || product
                .product_type
                .as_ref()
                .is_some_and(|t| self.types.contains(t));
        category_ok && type_ok
    }
}

/// Keeps the loading flag raised while alive, including across a cancelled
/// fetch.
struct LoadingFlag<'a>(&'a AtomicBool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Cached product list backed by the `products` table.
#[derive(Debug)]
pub struct Catalog<B> {
    backend: B,
    products: LiveCollection<Product>,
    loading: AtomicBool,
}

impl<B: Tables> Catalog<B> {
    /// Empty catalog; call [`Catalog::fetch_all`] to load it.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            products: LiveCollection::new(),
            loading: AtomicBool::new(false),
        }
    }

    /// Whether a fetch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// The underlying mirror, e.g. to feed it realtime changes.
    #[must_use]
    pub const fn collection(&self) -> &LiveCollection<Product> {
        &self.products
    }

    /// Load every product, newest first.
    ///
    /// On failure the error is logged and the previous list is kept.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) {
        let _loading = LoadingFlag::raise(&self.loading);
        let query = Query::table(Product::TABLE).order_by("id", Direction::Descending);
        match fetch_rows::<Product, _>(&self.backend, &query).await {
            Ok(products) => {
                tracing::debug!(count = products.len(), "Catalog loaded");
                self.products.replace_all(products);
            }
            Err(e) => log_stale(&e),
        }
    }

    /// Reload after a suspected stale read.
    pub async fn refresh(&self) {
        self.fetch_all().await;
    }

    /// Every cached product.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.products.snapshot()
    }

    /// Product whose identifier equals `id`, compared as text.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<Product> {
        self.products.get(id.trim())
    }

    /// Products of `category`. `""` and `"All"` return everything.
    #[must_use]
    pub fn get_by_category(&self, category: &str) -> Vec<Product> {
        if category.is_empty() || category == ALL_CATEGORIES {
            return self.products();
        }
        self.products.with_items(|items| {
            items
                .iter()
                .filter(|p| p.category.as_str() == category)
                .cloned()
                .collect()
        })
    }

    /// Filtered and sorted listing.
    #[must_use]
    pub fn browse(&self, filter: &BrowseFilter) -> Vec<Product> {
        let mut listing: Vec<Product> = self
            .products
            .with_items(|items| items.iter().filter(|p| filter.admits(p)).cloned().collect());
        match filter.sort {
            SortBy::Relevant => {}
            SortBy::PriceLow => listing.sort_by(|a, b| a.price.cmp(&b.price)),
            SortBy::PriceHigh => listing.sort_by(|a, b| b.price.cmp(&a.price)),
        }
        listing
    }

    /// Up to [`MAX_RELATED`] other products of the same category.
    #[must_use]
    pub fn related(&self, product: &Product) -> Vec<Product> {
        self.products.with_items(|items| {
            items
                .iter()
                .filter(|p| p.category == product.category && p.id != product.id)
                .take(MAX_RELATED)
                .cloned()
                .collect()
        })
    }
}

impl<B: Tables + Realtime> Catalog<B> {
    /// Apply product changes pushed by the backend until the handle is closed.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the subscription cannot be opened.
    pub async fn watch(&self) -> Result<Watch, BackendError> {
        watch(&self.backend, &self.products).await
    }
}

fn log_stale(e: &BackendError) {
    tracing::warn!(error = %e, "Catalog fetch failed, keeping cached products");
}
