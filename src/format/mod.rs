//! Output formatting for listings, product records and run summaries (table, JSON).

use crate::amazon::client::ClientStats;
use crate::amazon::markets::Market;
use crate::amazon::models::{ListingPage, Price, ProductRecord};
use crate::config::OutputFormat;
use crate::harvest::HarvestSummary;
use serde_json::json;

const TITLE_WIDTH: usize = 50;

/// Formats results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the stubs of one search page.
    pub fn format_listing(&self, listing: &ListingPage) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(listing).unwrap_or_else(|_| "{}".to_string()),
            OutputFormat::Table => self.table_listing(listing),
        }
    }

    /// Formats a single product record.
    pub fn format_record(&self, record: &ProductRecord) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(record).unwrap_or_else(|_| "{}".to_string()),
            OutputFormat::Table => self.table_record(record),
        }
    }

    /// Formats multiple product records.
    pub fn format_records(&self, records: &[ProductRecord]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string()),
            OutputFormat::Table if records.is_empty() => "No products found.".to_string(),
            OutputFormat::Table => {
                records.iter().map(|r| self.table_record(r)).collect::<Vec<_>>().join("\n\n")
            }
        }
    }

    pub fn format_summary(&self, summary: &HarvestSummary, stats: &ClientStats) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&json!({ "summary": summary, "requests": stats }))
                .unwrap_or_else(|_| "{}".to_string()),
            OutputFormat::Table => [
                format!("Categories processed: {}", summary.categories_processed),
                format!("Categories skipped:   {} (already completed)", summary.categories_skipped),
                format!("Categories failed:    {}", summary.categories_failed),
                format!("Products saved:       {}", summary.products_saved),
                format!("Duplicates rejected:  {}", summary.duplicates_rejected),
                format!("Already stored:       {}", summary.already_stored),
                format!("Without ASIN:         {}", summary.synthetic_skipped),
                format!("Detail failures:      {}", summary.detail_failures),
                format!("Write failures:       {}", summary.write_failures),
                format!(
                    "Requests:             {} ({} retries, {} rotations, {} blocks, {} failed)",
                    stats.requests, stats.retries, stats.rotations, stats.blocks, stats.failures
                ),
            ]
            .join("\n"),
        }
    }

    pub fn format_markets(&self) -> String {
        match self.format {
            OutputFormat::Json => {
                let markets: Vec<_> = Market::all()
                    .iter()
                    .map(|m| json!({ "code": m.to_string(), "domain": m.domain(), "currency": m.currency() }))
                    .collect();
                serde_json::to_string_pretty(&markets).unwrap_or_else(|_| "[]".to_string())
            }
            OutputFormat::Table => {
                let mut lines = vec![format!("{:<6}  {:<16}  {}", "Code", "Domain", "Currency")];
                for market in Market::all() {
                    lines.push(format!("{:<6}  {:<16}  {}", market.to_string(), market.domain(), market.currency()));
                }
                lines.join("\n")
            }
        }
    }

    fn table_listing(&self, listing: &ListingPage) -> String {
        if listing.stubs.is_empty() {
            return "No products found.".to_string();
        }

        let id_width = 16;
        let price_width = 12;
        let rating_width = 8;

        let mut lines = Vec::new();
        lines.push(format!(
            "{:<id_width$}  {:<price_width$}  {:<rating_width$}  {}",
            "ID", "Price", "Rating", "Title"
        ));
        lines.push(format!(
            "{:-<id_width$}  {:-<price_width$}  {:-<rating_width$}  {:-<TITLE_WIDTH$}",
            "", "", "", ""
        ));

        for stub in &listing.stubs {
            let rating = stub.rating.map(|r| format!("{:.1}", r.stars)).unwrap_or_else(|| "N/A".to_string());
            lines.push(format!(
                "{:<id_width$}  {:>price_width$}  {:>rating_width$}  {}",
                stub.id.to_string(),
                price_cell(stub.price.as_ref()),
                rating,
                truncate(&stub.title, TITLE_WIDTH)
            ));
        }

        lines.push(String::new());
        let mut footer = format!("Page {}: {} products", listing.page, listing.stubs.len());
        if listing.sponsored_skipped > 0 {
            footer.push_str(&format!(", {} sponsored skipped", listing.sponsored_skipped));
        }
        if listing.has_more {
            footer.push_str(", more pages available");
        }
        lines.push(footer);

        lines.join("\n")
    }

    fn table_record(&self, record: &ProductRecord) -> String {
        let mut lines = Vec::new();

        lines.push(format!("ASIN:    {}", record.id));
        lines.push(format!("Title:   {}", record.title));
        lines.push(format!("URL:     {}", record.url));
        lines.push(format!("Price:   {}", price_cell(record.price.as_ref())));
        lines.push(format!("Rating:  {:.1}/5 ({} reviews)", record.rating, record.review_count));

        if let Some(brand) = &record.brand {
            lines.push(format!("Brand:   {}", brand));
        }
        if !record.features.is_empty() {
            lines.push("About:".to_string());
            for feature in record.features.iter().take(5) {
                lines.push(format!("  - {}", truncate(feature, 100)));
            }
        }
        lines.push(format!("Images:  {}", record.images.len()));
        if !record.videos.is_empty() {
            lines.push(format!("Videos:  {}", record.videos.len()));
        }

        lines.join("\n")
    }
}

fn price_cell(price: Option<&Price>) -> String {
    match price {
        Some(Price { value: Some(v), currency, .. }) => format!("{} {:.2}", currency, v),
        Some(p) => p.text.clone(),
        None => "N/A".to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amazon::models::{ListingStub, ProductId, Rating};
    use chrono::Utc;

    fn stub(id: &str, title: &str) -> ListingStub {
        ListingStub {
            id: ProductId::Asin(id.to_string()),
            title: title.to_string(),
            url: format!("https://www.amazon.com/dp/{id}"),
            price: Some(Price { text: "$19.99".into(), value: Some(19.99), currency: "USD".into() }),
            rating: Some(Rating::new(4.4, 120)),
            brand: None,
            images: Vec::new(),
            position: 0,
        }
    }

    fn record() -> ProductRecord {
        ProductRecord {
            id: ProductId::Asin("B000000001".into()),
            title: "Desk Lamp".into(),
            url: "https://www.amazon.com/dp/B000000001".into(),
            market: Market::Us,
            price: None,
            rating: 0.0,
            review_count: 0,
            brand: Some("Lumina".into()),
            features: vec!["Dimmable".into()],
            images: vec!["https://m.media-amazon.com/images/I/a._AC_SL1500_.jpg".into()],
            videos: Vec::new(),
            category: None,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_table_listing() {
        let mut listing = ListingPage::new("lamp", 1);
        listing.stubs.push(stub("B000000001", "Desk Lamp"));
        listing.sponsored_skipped = 2;

        let out = Formatter::new(OutputFormat::Table).format_listing(&listing);
        assert!(out.contains("B000000001"));
        assert!(out.contains("USD 19.99"));
        assert!(out.contains("4.4"));
        assert!(out.contains("2 sponsored skipped"));
    }

    #[test]
    fn test_empty_listing() {
        let listing = ListingPage::new("lamp", 1);
        assert_eq!(Formatter::new(OutputFormat::Table).format_listing(&listing), "No products found.");
        assert!(Formatter::new(OutputFormat::Json).format_listing(&listing).contains("\"stubs\": []"));
    }

    #[test]
    fn test_table_record_without_price() {
        let out = Formatter::new(OutputFormat::Table).format_record(&record());
        assert!(out.contains("Price:   N/A"));
        assert!(out.contains("Rating:  0.0/5 (0 reviews)"));
        assert!(out.contains("Brand:   Lumina"));
        assert!(out.contains("  - Dimmable"));
    }

    #[test]
    fn test_json_records() {
        let out = Formatter::new(OutputFormat::Json).format_records(&[record()]);
        let parsed: Vec<ProductRecord> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "Desk Lamp");
    }

    #[test]
    fn test_summary_table() {
        let summary = HarvestSummary { categories_processed: 2, products_saved: 7, ..Default::default() };
        let stats = ClientStats { requests: 12, retries: 3, ..Default::default() };
        let out = Formatter::new(OutputFormat::Table).format_summary(&summary, &stats);
        assert!(out.contains("Categories processed: 2"));
        assert!(out.contains("Products saved:       7"));
        assert!(out.contains("12 (3 retries"));
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Küchenlampe", 8), "Küche...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_markets_table_lists_all() {
        let out = Formatter::new(OutputFormat::Table).format_markets();
        assert!(out.contains("amazon.co.uk"));
        assert_eq!(out.lines().count(), Market::all().len() + 1);
    }
}
