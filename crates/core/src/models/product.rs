//! Catalog products.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::wire::{blank_as_none, null_as_default};
use crate::sync::Record;
use crate::types::{Category, Price, ProductId};

/// Sizes offered when a product row carries no size list.
pub const DEFAULT_SIZES: [&str; 4] = ["S", "M", "L", "XL"];

/// A product row from the `products` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub category: Category,
    /// Garment type (e.g. "Topwear", "Winterwear").
    #[serde(
        rename = "type",
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_type: Option<String>,
    /// Primary image URL.
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
    /// Additional image URLs, in display order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub gallery: Vec<String>,
    /// 360° turntable video URL.
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_360: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default = "default_sizes", deserialize_with = "sizes_or_default")]
    pub sizes: Vec<String>,
}

/// One entry of a product's media strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    Image(String),
    Video(String),
}

impl Media {
    /// URL of the media item.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Image(url) | Self::Video(url) => url,
        }
    }
}

impl Product {
    /// Price in the shop currency.
    #[must_use]
    pub const fn price(&self) -> Price {
        Price::mad(self.price)
    }

    /// Media strip: primary image, gallery, then the 360° video.
    ///
    /// Blank URLs are skipped.
    #[must_use]
    pub fn media(&self) -> Vec<Media> {
        let mut media: Vec<Media> = std::iter::once(&self.image)
            .chain(&self.gallery)
            .filter(|url| !url.trim().is_empty())
            .map(|url| {
                if is_video_url(url) {
                    Media::Video(url.clone())
                } else {
                    Media::Image(url.clone())
                }
            })
            .collect();

        if let Some(video) = &self.video_360 {
            media.push(Media::Video(video.clone()));
        }
        media
    }
}

impl Record for Product {
    const TABLE: &'static str = "products";

    fn key(&self) -> &str {
        self.id.as_str()
    }
}

/// Whether a media URL points at a video file.
#[must_use]
pub fn is_video_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("video")
        || [".mp4", ".webm", ".ogg"]
            .iter()
            .any(|ext| lower.ends_with(ext))
}

fn default_sizes() -> Vec<String> {
    DEFAULT_SIZES.iter().map(ToString::to_string).collect()
}

fn sizes_or_default<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let sizes = Option::<Vec<String>>::deserialize(deserializer)?;
    Ok(sizes.filter(|s| !s.is_empty()).unwrap_or_else(default_sizes))
}
