//! Search command implementation.

use crate::amazon::{AmazonClient, AmazonSearch, ListingPage, Parser};
use crate::config::Config;
use crate::format::Formatter;
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Extracts a single search results page.
pub struct SearchCommand {
    config: Config,
}

impl SearchCommand {
    /// Creates a new search command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Executes the search and returns formatted output.
    pub async fn execute(&self, query: &str, page: u32) -> Result<String> {
        let client =
            AmazonClient::new(&self.config).await.context("Failed to create HTTP client")?;

        self.execute_with_client(&client, query, page).await
    }

    /// Executes the search with a provided client (for testing).
    pub async fn execute_with_client(
        &self,
        client: &impl AmazonSearch,
        query: &str,
        page: u32,
    ) -> Result<String> {
        info!("Searching for: {} (page {})", query, page);

        let parser = Parser::new(client.market()).with_synthetic_ids(self.config.synthetic_ids);
        let listing = match client.search(query, page).await {
            Some(html) => parser.extract_listing(&html, query, page),
            None => {
                warn!("Could not fetch page {} for '{}'", page, query);
                ListingPage::new(query, page)
            }
        };

        info!("Found {} products", listing.stubs.len());

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_listing(&listing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amazon::Market;
    use crate::amazon::SyntheticIds;
    use crate::config::OutputFormat;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Mock Amazon client for testing.
    struct MockAmazonClient {
        search_response: Option<String>,
        requested_page: AtomicU32,
    }

    impl MockAmazonClient {
        fn new(search_response: Option<String>) -> Self {
            Self { search_response, requested_page: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl AmazonSearch for MockAmazonClient {
        async fn search(&self, _query: &str, page: u32) -> Option<String> {
            self.requested_page.store(page, Ordering::SeqCst);
            self.search_response.clone()
        }

        async fn product(&self, _asin: &str) -> Option<String> {
            None
        }

        fn market(&self) -> Market {
            Market::Us
        }
    }

    fn make_test_config() -> Config {
        Config { delay_ms: 0, delay_jitter_ms: 0, ..Config::default() }
    }

    fn make_search_html(products: &[(&str, &str, f64)]) -> String {
        let mut html = String::from("<html><body>");
        for (asin, title, price) in products {
            html.push_str(&format!(
                r#"<div data-component-type="s-search-result" data-asin="{}">
                    <h2><a class="a-link-normal" href="/dp/{}"><span>{}</span></a></h2>
                    <span class="a-price"><span class="a-offscreen">${:.2}</span></span>
                </div>"#,
                asin, asin, title, price
            ));
        }
        html.push_str("</body></html>");
        html
    }

    #[tokio::test]
    async fn test_search_command_basic() {
        let html = make_search_html(&[
            ("B000000001", "Product One", 19.99),
            ("B000000002", "Product Two", 29.99),
        ]);

        let client = MockAmazonClient::new(Some(html));
        let cmd = SearchCommand::new(make_test_config());

        let output = cmd.execute_with_client(&client, "test", 3).await.unwrap();
        assert!(output.contains("B000000001"));
        assert!(output.contains("B000000002"));
        assert!(output.contains("Product One"));
        assert_eq!(client.requested_page.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_search_command_empty_results() {
        let client = MockAmazonClient::new(Some("<html></html>".to_string()));
        let cmd = SearchCommand::new(make_test_config());

        let output = cmd.execute_with_client(&client, "nonexistent", 1).await.unwrap();
        assert!(output.contains("No products found"));
    }

    #[tokio::test]
    async fn test_search_command_fetch_failure_is_not_an_error() {
        let client = MockAmazonClient::new(None);
        let cmd = SearchCommand::new(make_test_config());

        let output = cmd.execute_with_client(&client, "lamp", 1).await.unwrap();
        assert!(output.contains("No products found"));
    }

    #[tokio::test]
    async fn test_search_command_json_format() {
        let html = make_search_html(&[("B000000001", "Test Product", 19.99)]);

        let client = MockAmazonClient::new(Some(html));
        let config = Config { format: OutputFormat::Json, ..make_test_config() };

        let output = SearchCommand::new(config).execute_with_client(&client, "test", 1).await.unwrap();
        let listing: ListingPage = serde_json::from_str(&output).unwrap();
        assert_eq!(listing.stubs.len(), 1);
        assert_eq!(listing.stubs[0].title, "Test Product");
    }

    #[tokio::test]
    async fn test_search_command_drop_policy() {
        let html = r#"<html><body>
            <div data-component-type="s-search-result">
                <h2><a class="a-link-normal" href="/sspa/click?x=1"><span>No Identifier</span></a></h2>
            </div>
        </body></html>"#;

        let tracked = SearchCommand::new(make_test_config())
            .execute_with_client(&MockAmazonClient::new(Some(html.to_string())), "q", 1)
            .await
            .unwrap();
        assert!(tracked.contains("SYN-"));

        let config = Config { synthetic_ids: SyntheticIds::Drop, ..make_test_config() };
        let dropped = SearchCommand::new(config)
            .execute_with_client(&MockAmazonClient::new(Some(html.to_string())), "q", 1)
            .await
            .unwrap();
        assert!(dropped.contains("No products found"));
    }
}
