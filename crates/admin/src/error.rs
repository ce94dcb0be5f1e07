//! Unified error handling for admin.

use elvora_core::backend::BackendError;
use thiserror::Error;

/// Errors reported by admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Backend operation failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// No admin is signed in.
    #[error("Not signed in")]
    Unauthenticated,

    /// The product is not in the admin mirror.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A new product needs a main image.
    #[error("Main image is required")]
    MissingMainImage,

    /// Too many gallery images were supplied.
    #[error("At most {max} gallery images are allowed, got {got}")]
    TooManyGalleryImages { max: usize, got: usize },

    /// Product fields failed validation.
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    /// A local media file could not be read.
    #[error("Could not read media file {path}: {source}")]
    MediaFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl AdminError {
    /// Whether the error was caused by the backend rather than by input.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
