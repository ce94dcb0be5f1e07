//! Catalog management.
//!
//! Media files are uploaded to public blob storage first, under
//! `main_<ms>_<name>`, `gallery_<ms>_<name>` and `video_<ms>_<name>`; the
//! resulting public URLs are then written on the product row. The admin
//! mirror picks the change up from the realtime echo.

use std::path::Path;

use chrono::Utc;
use elvora_core::backend::{Backend, BackendError, BlobStorage, Tables};
use elvora_core::sync::Record;
use elvora_core::{Category, DEFAULT_SIZES, Product};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::error::AdminError;
use crate::state::AdminState;

/// Gallery images allowed per product, besides the main image.
pub const MAX_GALLERY_IMAGES: usize = 2;

/// Product fields edited by the admin, without media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub price: Decimal,
    pub category: Category,
    pub product_type: Option<String>,
    pub description: String,
    pub sizes: Vec<String>,
}

impl ProductDraft {
    /// Draft with the default size run and no type or description.
    #[must_use]
    pub fn new(name: impl Into<String>, price: Decimal, category: Category) -> Self {
        Self {
            name: name.into(),
            price,
            category,
            product_type: None,
            description: String::new(),
            sizes: DEFAULT_SIZES.iter().map(ToString::to_string).collect(),
        }
    }

    /// Draft pre-filled from an existing product.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price,
            category: product.category,
            product_type: product.product_type.clone(),
            description: product.description.clone(),
            sizes: product.sizes.clone(),
        }
    }

    fn validate(&self) -> Result<(), AdminError> {
        if self.name.trim().is_empty() {
            return Err(AdminError::InvalidProduct("name is required".to_string()));
        }
        if self.price.is_sign_negative() {
            return Err(AdminError::InvalidProduct("price cannot be negative".to_string()));
        }
        Ok(())
    }
}

/// A media file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl MediaFile {
    /// Wrap in-memory bytes; the content type is guessed from `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = content_type_for(&name).to_string();
        Self {
            name,
            bytes,
            content_type,
        }
    }

    /// Read a file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::MediaFile`] if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AdminError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AdminError::MediaFile {
                path: path.display().to_string(),
                source,
            })?;
        let name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(name, bytes))
    }
}

fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogg" => "video/ogg",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Which slot an uploaded file fills.
#[derive(Debug, Clone, Copy)]
enum MediaSlot {
    Main,
    Gallery,
    Video,
}

impl MediaSlot {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Gallery => "gallery",
            Self::Video => "video",
        }
    }
}

/// Storage object name for `file` in `slot`, e.g. `main_1767225600000_tee.jpg`.
fn object_name(slot: MediaSlot, file: &MediaFile) -> String {
    let safe: String = file
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}_{safe}", slot.prefix(), Utc::now().timestamp_millis())
}

/// Column values written for a product.
///
/// Every column is written, so an update also clears a removed type
/// (stored as `""`).
#[derive(Debug, Serialize)]
struct ProductRow<'a> {
    name: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    category: Category,
    #[serde(rename = "type")]
    product_type: &'a str,
    description: &'a str,
    sizes: &'a [String],
    image: String,
    gallery: Vec<String>,
    video_360: String,
}

impl<'a> ProductRow<'a> {
    fn new(draft: &'a ProductDraft, image: String, gallery: Vec<String>, video: Option<String>) -> Self {
        Self {
            name: draft.name.trim(),
            price: draft.price,
            category: draft.category,
            product_type: draft.product_type.as_deref().map_or("", str::trim),
            description: &draft.description,
            sizes: &draft.sizes,
            image,
            gallery,
            video_360: video.unwrap_or_default(),
        }
    }
}

fn check_gallery(gallery: &[MediaFile]) -> Result<(), AdminError> {
    if gallery.len() > MAX_GALLERY_IMAGES {
        return Err(AdminError::TooManyGalleryImages {
            max: MAX_GALLERY_IMAGES,
            got: gallery.len(),
        });
    }
    Ok(())
}

impl<B> AdminState<B>
where
    B: Backend + Clone + 'static,
{
    async fn upload(&self, slot: MediaSlot, file: MediaFile) -> Result<String, AdminError> {
        let name = object_name(slot, &file);
        self.backend
            .upload(&self.media_bucket, &name, file.bytes, &file.content_type)
            .await?;
        tracing::debug!(object = %name, "Uploaded product media");
        Ok(self.backend.public_url(&self.media_bucket, &name))
    }

    async fn upload_gallery(&self, gallery: Vec<MediaFile>) -> Result<Vec<String>, AdminError> {
        let mut urls = Vec::with_capacity(gallery.len());
        for file in gallery {
            urls.push(self.upload(MediaSlot::Gallery, file).await?);
        }
        Ok(urls)
    }

    /// Upload media and insert a new product.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any upload if the draft is invalid,
    /// the main image is missing or the gallery is too large; otherwise the
    /// first failing upload or the insert error.
    #[instrument(skip_all, fields(name = %draft.name))]
    pub async fn add_product(
        &self,
        draft: &ProductDraft,
        main_image: Option<MediaFile>,
        gallery: Vec<MediaFile>,
        video: Option<MediaFile>,
    ) -> Result<(), AdminError> {
        draft.validate()?;
        let main_image = main_image.ok_or(AdminError::MissingMainImage)?;
        check_gallery(&gallery)?;

        let image = self.upload(MediaSlot::Main, main_image).await?;
        let gallery = self.upload_gallery(gallery).await?;
        let video = match video {
            Some(file) => Some(self.upload(MediaSlot::Video, file).await?),
            None => None,
        };

        let row = serde_json::to_value(ProductRow::new(draft, image, gallery, video))
            .map_err(BackendError::from)?;
        self.backend.insert(Product::TABLE, row).await?;
        tracing::info!("Product added");
        Ok(())
    }

    /// Upload any replacement media and update product `id`.
    ///
    /// Media not supplied keeps its current URL. A non-empty `new_gallery`
    /// replaces the whole gallery.
    ///
    /// # Errors
    ///
    /// Returns [`AdminError::ProductNotFound`] if `id` is not mirrored, a
    /// validation error, or the first failing upload or update.
    #[instrument(skip_all, fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: &str,
        draft: &ProductDraft,
        new_main_image: Option<MediaFile>,
        new_gallery: Vec<MediaFile>,
        new_video: Option<MediaFile>,
    ) -> Result<(), AdminError> {
        let current = self
            .product(id)
            .ok_or_else(|| AdminError::ProductNotFound(id.to_string()))?;
        draft.validate()?;
        check_gallery(&new_gallery)?;
        let key = current.key().to_string();

        let image = match new_main_image {
            Some(file) => self.upload(MediaSlot::Main, file).await?,
            None => current.image,
        };
        let gallery = if new_gallery.is_empty() {
            current.gallery
        } else {
            self.upload_gallery(new_gallery).await?
        };
        let video = match new_video {
            Some(file) => Some(self.upload(MediaSlot::Video, file).await?),
            None => current.video_360,
        };

        let patch = serde_json::to_value(ProductRow::new(draft, image, gallery, video))
            .map_err(BackendError::from)?;
        self.backend.update(Product::TABLE, &key, patch).await?;
        tracing::info!("Product updated");
        Ok(())
    }

    /// Delete product `id`.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &str) -> Result<(), AdminError> {
        self.backend.delete(Product::TABLE, id.trim()).await?;
        tracing::info!("Product deleted");
        Ok(())
    }
}
