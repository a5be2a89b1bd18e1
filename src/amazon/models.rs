//! Data models for listings, product records and identifiers.

use crate::amazon::markets::Market;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum number of images kept on a listing or record.
pub const MAX_IMAGES: usize = 5;

/// Identifier of a scraped product.
///
/// Only `Asin` values are part of the public contract: they address detail
/// pages and name product files. `Synthetic` ids exist so a listing without
/// a resolvable ASIN can still be tracked and deduplicated within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ProductId {
    Asin(String),
    Synthetic(String),
}

impl ProductId {
    /// Validates a marketplace ASIN (10 ASCII alphanumerics, case-folded).
    pub fn asin(raw: &str) -> Option<Self> {
        Self::is_valid_asin(raw).then(|| ProductId::Asin(raw.trim().to_uppercase()))
    }

    /// Ten ASCII alphanumerics once surrounding whitespace is trimmed.
    pub fn is_valid_asin(raw: &str) -> bool {
        let raw = raw.trim();
        raw.len() == 10 && raw.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// Derives a stable fallback id from whatever identifies the listing.
    pub fn synthetic(title: &str, url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(title.trim().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.trim().as_bytes());
        let digest = hex::encode(hasher.finalize());
        ProductId::Synthetic(format!("SYN-{}", &digest[..12]))
    }

    /// Returns the ASIN if this is a marketplace identifier.
    pub fn as_asin(&self) -> Option<&str> {
        match self {
            ProductId::Asin(asin) => Some(asin),
            ProductId::Synthetic(_) => None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, ProductId::Synthetic(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ProductId::Asin(v) | ProductId::Synthetic(v) => v,
        }
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A price as displayed, with its parsed value when one could be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub text: String,
    pub value: Option<f64>,
    pub currency: String,
}

/// Star rating and review count as shown next to a product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// Star rating (0.0 - 5.0)
    pub stars: f32,
    pub review_count: u32,
}

impl Rating {
    pub fn new(stars: f32, review_count: u32) -> Self {
        Self { stars: stars.clamp(0.0, 5.0), review_count }
    }
}

/// One usable result card from a search page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingStub {
    pub id: ProductId,
    pub title: String,
    pub url: String,
    pub price: Option<Price>,
    pub rating: Option<Rating>,
    pub brand: Option<String>,
    pub images: Vec<String>,
    /// Zero-based position among the page's result cards.
    pub position: usize,
}

/// Parsed search results page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPage {
    pub query: String,
    pub page: u32,
    pub stubs: Vec<ListingStub>,
    /// Whether a next-page link was present.
    pub has_more: bool,
    pub sponsored_skipped: usize,
    pub unidentified_dropped: usize,
    pub total_results: Option<u32>,
}

impl ListingPage {
    pub fn new(query: impl Into<String>, page: u32) -> Self {
        Self {
            query: query.into(),
            page,
            stubs: Vec::new(),
            has_more: false,
            sponsored_skipped: 0,
            unidentified_dropped: 0,
            total_results: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.is_empty()
    }
}

/// Category a product was harvested for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
}

/// A fully extracted product, written once as `{asin}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub title: String,
    pub url: String,
    pub market: Market,
    pub price: Option<Price>,
    /// 0.0 when the page showed no rating.
    pub rating: f32,
    pub review_count: u32,
    pub brand: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    pub category: Option<CategoryRef>,
    pub scraped_at: DateTime<Utc>,
}

impl ProductRecord {
    pub fn price_value(&self) -> Option<f64> {
        self.price.as_ref().and_then(|p| p.value)
    }
}
