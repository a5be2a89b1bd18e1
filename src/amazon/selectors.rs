//! Selector cascades for Amazon HTML parsing.
//!
//! Every field lists its strategies in priority order: the current layout
//! first, older layouts next, raw-HTML patterns last. Update this file when
//! Amazon changes their HTML structure.
//!
//! **Update process**: When parsing fails, capture HTML sample,
//! add or reorder strategies, and add a test fixture.

use crate::amazon::extract::{Cascade, CssAttr, CssText, OwnAttr, RawPattern};
use crate::amazon::models::ProductId;
use scraper::Selector;
use std::sync::LazyLock;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

/// Search results pages.
pub mod search {
    use super::*;

    /// Product card container.
    pub static RESULT: LazyLock<Selector> =
        LazyLock::new(|| selector("[data-component-type='s-search-result']"));

    pub static ASIN: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("asin")
            .then(Some(OwnAttr("data-asin")))
            .then(CssAttr::new("[data-asin]", "data-asin"))
            .then(RawPattern::new(r#"/dp/([A-Za-z0-9]{10})(?:[/?&"']|$)"#))
            .then(RawPattern::new(r"/gp/product/([A-Za-z0-9]{10})"))
            .accepting(ProductId::is_valid_asin)
    });

    pub static TITLE: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("title")
            .then(CssText::new("h2 a span"))
            .then(CssText::new("h2 span.a-text-normal"))
            .then(CssText::new(".a-size-medium.a-text-normal"))
            .then(CssText::new(".a-size-base-plus.a-text-normal"))
            .then(CssAttr::new("h2", "aria-label"))
            .then(CssAttr::new("img.s-image", "alt"))
    });

    pub static LINK: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("link")
            .then(CssAttr::new("h2 a.a-link-normal", "href"))
            .then(CssAttr::new("a.s-link-style", "href"))
            .then(CssAttr::new("a.a-link-normal.s-underline-text", "href"))
            .then(CssAttr::new("a[href*='/dp/']", "href"))
    });

    pub static PRICE: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("price")
            .then(CssText::new(".a-price:not([data-a-strike]) .a-offscreen"))
            .then(CssText::new(".a-price .a-offscreen"))
            .then(CssText::new(".a-price-whole"))
            .then(CssText::new(".a-color-base.a-text-bold"))
    });

    pub static RATING: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("rating")
            .then(CssText::new("i.a-icon-star-small span.a-icon-alt"))
            .then(CssText::new("i.a-icon-star span.a-icon-alt"))
            .then(CssText::new("span.a-icon-alt"))
            .then(CssAttr::new("[aria-label*='out of 5']", "aria-label"))
    });

    pub static REVIEW_COUNT: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("review_count")
            .then(CssText::new("span.a-size-base.s-underline-text"))
            .then(CssText::new("a[href*='customerReviews'] span"))
            .then(CssText::new(".a-size-base.puis-light-weight-text"))
    });

    pub static BRAND: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("brand")
            .then(CssText::new("h5.s-line-clamp-1 span"))
            .then(CssText::new(".a-row.a-size-base.a-color-secondary h2 span"))
            .then(CssText::new(".s-title-instructions-style .a-size-base-plus.a-color-base"))
    });

    /// Every image inside a card; `src` and `srcset` are both harvested.
    pub static IMAGES: LazyLock<Selector> =
        LazyLock::new(|| selector("img.s-image, .s-product-image-container img"));

    /// Ad label elements; text markers are checked as a fallback.
    pub static SPONSORED: LazyLock<Selector> = LazyLock::new(|| {
        selector(
            ".puis-label-popover-default, \
             .s-label-popover-default, \
             .puis-sponsored-label-text, \
             [data-component-type='sp-sponsored-result']",
        )
    });

    /// "Sponsored" in every supported market language.
    pub const SPONSORED_MARKERS: &[&str] = &[
        "sponsored",
        "gesponsert",
        "sponsorisé",
        "patrocinado",
        "sponsorizzato",
        "gesponsord",
        "sponsrad",
        "sponsorowane",
        "スポンサー",
    ];

    pub static NEXT_PAGE: LazyLock<Selector> = LazyLock::new(|| {
        selector(
            "a.s-pagination-next, \
             .s-pagination-item.s-pagination-next:not(.s-pagination-disabled)",
        )
    });

    pub static TOTAL_RESULTS: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("total_results")
            .then(CssText::new("[data-component-type='s-result-info-bar'] h1 span"))
            .then(CssText::new(".a-section.a-spacing-small span:first-child"))
    });
}

/// Product detail pages.
pub mod product {
    use super::*;

    pub static TITLE: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("title")
            .then(CssText::new("#productTitle"))
            .then(CssText::new("#title span"))
            .then(CssText::new(".product-title-word-break"))
            .then(CssAttr::new("meta[name='title']", "content"))
    });

    pub static PRICE: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("price")
            .then(CssText::new("#corePrice_feature_div .a-price .a-offscreen"))
            .then(CssText::new("#corePriceDisplay_desktop_feature_div .a-price .a-offscreen"))
            .then(CssText::new("#priceblock_ourprice"))
            .then(CssText::new("#priceblock_dealprice"))
            .then(CssText::new("#price_inside_buybox"))
            .then(CssText::new(".a-price .a-offscreen"))
            .then(RawPattern::new(r#""displayPrice"\s*:\s*"([^"]+)""#))
    });

    pub static RATING: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("rating")
            .then(CssText::new("#acrPopover span.a-icon-alt"))
            .then(CssAttr::new("#acrPopover", "title"))
            .then(CssText::new("[data-hook='rating-out-of-text']"))
            .then(CssText::new(".a-icon-star span.a-icon-alt"))
    });

    pub static REVIEW_COUNT: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("review_count")
            .then(CssText::new("#acrCustomerReviewText"))
            .then(CssText::new("#acrCustomerReviewLink span"))
            .then(CssText::new("[data-hook='total-review-count']"))
    });

    pub static BRAND: LazyLock<Cascade> = LazyLock::new(|| {
        Cascade::new("brand")
            .then(CssText::new("#bylineInfo"))
            .then(CssText::new(".po-brand .po-break-word"))
            .then(RawPattern::new(r#""brand"\s*:\s*"([^"]+)""#))
    });

    /// "About this item" bullet points.
    pub static FEATURES: LazyLock<Selector> =
        LazyLock::new(|| selector("#feature-bullets li, #featurebullets_feature_div li"));

    pub static LANDING_IMAGE: LazyLock<Selector> =
        LazyLock::new(|| selector("#landingImage, #imgTagWrapperId img, #main-image"));

    pub static ALT_IMAGES: LazyLock<Selector> =
        LazyLock::new(|| selector("#altImages img, #imageBlock img"));

    pub static VIDEO_ATTRS: LazyLock<Selector> =
        LazyLock::new(|| selector("[data-video-url], video source[src]"));
}

/// Markers of CAPTCHA, robot-check and "continue shopping" interstitials,
/// matched case-insensitively against the raw response body.
pub const BLOCK_MARKERS: &[&str] = &[
    "/errors/validatecaptcha",
    "enter the characters you see below",
    "type the characters you see in this image",
    "to discuss automated access to amazon data",
    "click the button below to continue shopping",
    "sorry, we just need to make sure you're not a robot",
];
