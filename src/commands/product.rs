//! Product lookup command implementation.

use crate::amazon::{AmazonClient, AmazonSearch, Parser, ProductId, ProductRecord};
use crate::config::Config;
use crate::format::Formatter;
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Fetches detail records by ASIN.
pub struct ProductCommand {
    config: Config,
}

impl ProductCommand {
    /// Creates a new product command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Fetches products by ASIN and returns formatted output.
    pub async fn execute(&self, asins: &[String]) -> Result<String> {
        let client =
            AmazonClient::new(&self.config).await.context("Failed to create HTTP client")?;

        self.execute_with_client(&client, asins).await
    }

    /// Fetches products with a provided client (for testing).
    ///
    /// Invalid ASINs and pages that cannot be fetched are skipped with a warning.
    pub async fn execute_with_client(
        &self,
        client: &impl AmazonSearch,
        asins: &[String],
    ) -> Result<String> {
        let parser = Parser::new(client.market());
        let mut records: Vec<ProductRecord> = Vec::new();

        for raw in asins {
            let Some(id) = ProductId::asin(raw) else {
                warn!("Skipping invalid ASIN '{}': expected 10 alphanumeric characters", raw);
                continue;
            };

            info!("Looking up product: {}", id);
            let Some(html) = client.product(id.as_str()).await else {
                warn!("Could not fetch product {}", id);
                continue;
            };
            records.push(parser.extract_detail(&html, &parser.stub_for(id)));
        }

        let formatter = Formatter::new(self.config.format);
        Ok(match records.as_slice() {
            [single] => formatter.format_record(single),
            many => formatter.format_records(many),
        })
    }
}
