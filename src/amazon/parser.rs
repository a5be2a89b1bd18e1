//! HTML extraction for Amazon search results and product detail pages.

use crate::amazon::extract::squash;
use crate::amazon::markets::Market;
use crate::amazon::models::{
    ListingPage, ListingStub, Price, ProductId, ProductRecord, Rating, MAX_IMAGES,
};
use crate::amazon::selectors::{product, search, BLOCK_MARKERS};
use chrono::Utc;
use regex_lite::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, trace};

/// A number with optional thousands groups and decimals: "12.99", "1,234.56",
/// "1.299,00", "1 299,00".
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+(?:[ .,][0-9]{3})*(?:[.,][0-9]+)?").unwrap());

static SIZE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\._[A-Za-z0-9_,-]+_\.").unwrap());

static HI_RES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""hiRes"\s*:\s*"(https://[^"]+)""#).unwrap());

static MP4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(https://[^"\s]+?\.mp4)""#).unwrap());

/// Size token that makes Amazon's image CDN serve a 1500px rendition.
const HIGH_RES_TOKEN: &str = "._AC_SL1500_.";

/// What to do with a result card whose ASIN cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntheticIds {
    /// Keep the card under a hash-derived id.
    #[default]
    Track,
    /// Discard the card.
    Drop,
}

impl std::str::FromStr for SyntheticIds {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "track" => Ok(SyntheticIds::Track),
            "drop" => Ok(SyntheticIds::Drop),
            _ => Err(format!("Unknown synthetic id policy: {}. Use: track, drop", s)),
        }
    }
}

/// Returns the marker that identifies `body` as a CAPTCHA or robot-check page.
pub fn detect_block(body: &str) -> Option<&'static str> {
    let lowered = body.to_lowercase();
    BLOCK_MARKERS.iter().copied().find(|marker| lowered.contains(marker))
}

/// Parser for Amazon HTML pages.
pub struct Parser {
    market: Market,
    synthetic_ids: SyntheticIds,
}

impl Parser {
    /// Creates a new parser for the given market.
    pub fn new(market: Market) -> Self {
        Self { market, synthetic_ids: SyntheticIds::default() }
    }

    pub fn with_synthetic_ids(mut self, policy: SyntheticIds) -> Self {
        self.synthetic_ids = policy;
        self
    }

    pub fn market(&self) -> Market {
        self.market
    }

    /// Extracts the usable result cards of a search page.
    ///
    /// Sponsored cards are skipped; cards without a resolvable ASIN are kept
    /// under a synthetic id or dropped according to the configured policy.
    /// Missing fields never fail the page.
    pub fn extract_listing(&self, html: &str, query: &str, page: u32) -> ListingPage {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let mut listing = ListingPage::new(query, page);
        listing.total_results = search::TOTAL_RESULTS.run(root).and_then(|t| parse_total(&t));

        let mut seen = HashSet::new();
        for (position, card) in document.select(&search::RESULT).enumerate() {
            if self.is_sponsored(card) {
                trace!("Skipping sponsored card at position {}", position);
                listing.sponsored_skipped += 1;
                continue;
            }

            let Some(stub) = self.listing_stub(card, position) else {
                trace!("Dropping card without identifier at position {}", position);
                listing.unidentified_dropped += 1;
                continue;
            };

            if seen.insert(stub.id.clone()) {
                trace!("Parsed listing: {} - {}", stub.id, stub.title);
                listing.stubs.push(stub);
            }
        }

        listing.has_more = document.select(&search::NEXT_PAGE).next().is_some();

        debug!(
            "Page {} of '{}': {} listings, {} sponsored skipped, {} unidentified dropped",
            page,
            query,
            listing.stubs.len(),
            listing.sponsored_skipped,
            listing.unidentified_dropped
        );

        listing
    }

    /// Builds a product record from a detail page, falling back to the
    /// listing's values for every field the page does not show.
    pub fn extract_detail(&self, html: &str, stub: &ListingStub) -> ProductRecord {
        let document = Html::parse_document(html);
        let root = document.root_element();

        // Detail pages embed other products' ASINs in carousels; the
        // listing's id is authoritative.
        let id = stub.id.clone();

        let title = product::TITLE.run(root).unwrap_or_else(|| stub.title.clone());

        let price = product::PRICE
            .run(root)
            .and_then(|text| self.parse_price(&text))
            .or_else(|| stub.price.clone());

        let stars = product::RATING.run(root).and_then(|t| parse_stars(&t));
        let reviews = product::REVIEW_COUNT.run(root).map(|t| parse_review_count(&t));
        let rating = match (stars, stub.rating) {
            (Some(stars), listed) => {
                Rating::new(stars, reviews.or(listed.map(|r| r.review_count)).unwrap_or(0))
            }
            (None, Some(listed)) => listed,
            (None, None) => Rating::new(0.0, reviews.unwrap_or(0)),
        };

        let brand = product::BRAND.run(root).map(|b| clean_brand(&b)).or_else(|| stub.brand.clone());

        let features: Vec<String> = document
            .select(&product::FEATURES)
            .map(|e| squash(&e.text().collect::<String>()))
            .filter(|f| !f.is_empty())
            .fold(Vec::new(), |mut acc, f| {
                if !acc.contains(&f) {
                    acc.push(f);
                }
                acc
            });

        let mut images = ImageSet::default();
        for landing in document.select(&product::LANDING_IMAGE) {
            let el = landing.value();
            if let Some(hires) = el.attr("data-old-hires") {
                images.push(hires);
            }
            if let Some(dynamic) = el.attr("data-a-dynamic-image") {
                for url in dynamic_image_urls(dynamic) {
                    images.push(&url);
                }
            }
            if let Some(src) = el.attr("src") {
                images.push(src);
            }
        }
        for cap in HI_RES.captures_iter(html) {
            images.push(&cap[1]);
        }
        for thumb in document.select(&product::ALT_IMAGES) {
            if let Some(src) = thumb.value().attr("src") {
                images.push(src);
            }
        }
        for url in &stub.images {
            images.push(url);
        }

        let mut videos: Vec<String> = Vec::new();
        let attr_videos = document.select(&product::VIDEO_ATTRS).filter_map(|e| {
            e.value().attr("data-video-url").or_else(|| e.value().attr("src")).map(String::from)
        });
        let raw_videos = MP4.captures_iter(html).map(|c| c[1].to_string());
        for url in attr_videos.chain(raw_videos) {
            if url.starts_with("http") && !videos.contains(&url) {
                videos.push(url);
            }
        }

        let url = match id.as_asin() {
            Some(asin) => format!("{}/dp/{}", self.market.base_url(), asin),
            None => stub.url.clone(),
        };

        ProductRecord {
            id,
            title,
            url,
            market: self.market,
            price,
            rating: rating.stars,
            review_count: rating.review_count,
            brand,
            features,
            images: images.into_vec(),
            videos,
            category: None,
            scraped_at: Utc::now(),
        }
    }

    /// Creates the stub used when a detail page is requested by ASIN alone.
    pub fn stub_for(&self, id: ProductId) -> ListingStub {
        let url = match id.as_asin() {
            Some(asin) => format!("{}/dp/{}", self.market.base_url(), asin),
            None => String::new(),
        };
        ListingStub {
            id,
            title: String::new(),
            url,
            price: None,
            rating: None,
            brand: None,
            images: Vec::new(),
            position: 0,
        }
    }

    /// Parses a displayed price into text and numeric value.
    ///
    /// Returns `None` when the text carries no number ("See price in cart").
    pub fn parse_price(&self, text: &str) -> Option<Price> {
        let value = self.parse_price_value(text)?;
        Some(Price {
            text: squash(text),
            value: Some(value),
            currency: self.market.currency().to_string(),
        })
    }

    /// Reads the first number in `text` using the market's decimal convention.
    /// Ranges such as "$10 - $20" yield the lower bound.
    fn parse_price_value(&self, text: &str) -> Option<f64> {
        let spaced = text.replace(['\u{a0}', '\u{202f}'], " ");
        let token = NUMBER.find(&spaced)?.as_str();
        let cleaned: String = token.chars().filter(|c| !c.is_whitespace()).collect();
        let cleaned = cleaned.trim_end_matches(['.', ',']);
        if cleaned.is_empty() {
            return None;
        }

        let normalized = if self.market.uses_comma_decimal() {
            // EU format: 1.234,56 -> 1234.56
            cleaned.replace('.', "").replace(',', ".")
        } else {
            // US format: 1,234.56 -> 1234.56
            cleaned.replace(',', "")
        };

        normalized.parse().ok()
    }

    fn listing_stub(&self, card: ElementRef, position: usize) -> Option<ListingStub> {
        let title = search::TITLE.run(card).unwrap_or_default();
        let link = search::LINK.run(card).map(|href| self.absolute_url(&href));

        let id = match search::ASIN.run(card).and_then(|raw| ProductId::asin(&raw)) {
            Some(id) => id,
            None => match self.synthetic_ids {
                SyntheticIds::Drop => return None,
                SyntheticIds::Track if title.is_empty() && link.is_none() => return None,
                SyntheticIds::Track => {
                    ProductId::synthetic(&title, link.as_deref().unwrap_or_default())
                }
            },
        };

        let url = match (&id, link) {
            (ProductId::Asin(asin), _) => format!("{}/dp/{}", self.market.base_url(), asin),
            (ProductId::Synthetic(_), Some(link)) => link,
            (ProductId::Synthetic(_), None) => String::new(),
        };

        let price = search::PRICE.run(card).and_then(|text| self.parse_price(&text));

        let rating = search::RATING.run(card).and_then(|t| parse_stars(&t)).map(|stars| {
            let count = search::REVIEW_COUNT.run(card).map(|t| parse_review_count(&t));
            Rating::new(stars, count.unwrap_or(0))
        });

        let brand = search::BRAND.run(card).map(|b| clean_brand(&b));

        let mut images = ImageSet::default();
        for img in card.select(&search::IMAGES) {
            if let Some(src) = img.value().attr("src") {
                images.push(src);
            }
            if let Some(srcset) = img.value().attr("srcset") {
                for candidate in srcset.split(", ") {
                    if let Some(url) = candidate.split_whitespace().next() {
                        images.push(url);
                    }
                }
            }
        }

        Some(ListingStub {
            id,
            title,
            url,
            price,
            rating,
            brand,
            images: images.into_vec(),
            position,
        })
    }

    /// Ad label element, or a "Sponsored" marker in any market language.
    fn is_sponsored(&self, card: ElementRef) -> bool {
        if card.select(&search::SPONSORED).next().is_some() {
            return true;
        }

        let text = card.text().collect::<String>().to_lowercase();
        search::SPONSORED_MARKERS.iter().any(|marker| text.contains(marker))
    }

    fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", self.market.base_url(), href)
        }
    }
}

/// Deduplicated, capped, quality-upgraded image URLs in discovery order.
#[derive(Default)]
struct ImageSet {
    urls: Vec<String>,
}

impl ImageSet {
    fn push(&mut self, raw: &str) {
        if self.urls.len() >= MAX_IMAGES {
            return;
        }
        let raw = raw.trim();
        if !raw.starts_with("http") || raw.contains("transparent-pixel") || raw.ends_with(".gif")
        {
            return;
        }
        let url = upgrade_image_url(raw);
        if !self.urls.contains(&url) {
            self.urls.push(url);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

/// Rewrites Amazon's size token (`._AC_UY218_.`) to the high-resolution one.
pub fn upgrade_image_url(url: &str) -> String {
    SIZE_TOKEN.replace(url, HIGH_RES_TOKEN).into_owned()
}

/// Keys of a `data-a-dynamic-image` attribute (`{"url": [w, h], ...}`).
fn dynamic_image_urls(attr: &str) -> Vec<String> {
    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(attr)
        .map(|map| map.into_iter().map(|(url, _)| url).collect())
        .unwrap_or_default()
}

/// Extracts a star rating from "4.5 out of 5 stars", "4,5 von 5 Sternen"
/// or "5つ星のうち4.3".
pub fn parse_stars(text: &str) -> Option<f32> {
    let numbers: Vec<&str> = NUMBER
        .find_iter(text)
        .map(|m| m.as_str().trim().trim_end_matches(['.', ',']))
        .filter(|n| !n.is_empty())
        .collect();

    // Japanese pages put the scale first.
    let picked = if text.contains("のうち") { numbers.last() } else { numbers.first() }?;
    let stars: f32 = picked.replace(',', ".").parse().ok()?;
    Some(stars.clamp(0.0, 5.0))
}

/// Extracts a review count from text like "1,234" or "(1.234)".
pub fn parse_review_count(text: &str) -> u32 {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    cleaned.parse().unwrap_or(0)
}

/// Parses "1-48 of over 10,000 results" into 10000.
fn parse_total(text: &str) -> Option<u32> {
    let cleaned: String =
        text.split(" of ").nth(1)?.chars().filter(|c| c.is_ascii_digit()).collect();
    cleaned.parse().ok()
}

fn clean_brand(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("Brand:")
        .trim_start_matches("Marke:")
        .trim_start_matches("Visit the")
        .trim_start_matches("Besuche den")
        .trim_end_matches("Store")
        .trim_end_matches("-Store")
        .trim_start_matches("by ")
        .trim()
        .to_string()
}
