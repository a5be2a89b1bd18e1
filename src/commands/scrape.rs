//! Catalog scrape command: harvest products for a category file.

use crate::amazon::{AmazonClient, AmazonSearch, Parser};
use crate::catalog::{load_categories, CategoryDescriptor};
use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::format::Formatter;
use crate::harvest::{Dispatcher, HarvestOptions, HarvestSummary, Scraper};
use crate::store::ProductStore;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// What to scrape from the category file.
#[derive(Debug, Clone, Default)]
pub struct ScrapeRequest {
    pub categories_file: PathBuf,
    /// Only this category id.
    pub category: Option<String>,
    /// Only the first category not yet completed.
    pub single: bool,
    /// Overrides every category's product quota.
    pub quota: Option<usize>,
}

pub struct ScrapeCommand {
    config: Config,
}

impl ScrapeCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the harvest and returns the formatted summary.
    pub async fn execute(&self, request: &ScrapeRequest) -> Result<String> {
        let categories = self.select_categories(request)?;
        let client =
            AmazonClient::new(&self.config).await.context("Failed to create HTTP client")?;

        let scraper = Arc::new(self.scraper(client));
        let summary = self.harvest(scraper.clone(), &categories).await;

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_summary(&summary, &scraper.client().stats()))
    }

    pub fn scraper<C: AmazonSearch>(&self, client: C) -> Scraper<C> {
        let parser = Parser::new(client.market()).with_synthetic_ids(self.config.synthetic_ids);
        Scraper::new(client, parser, self.config.cache_capacity)
    }

    /// Runs the dispatcher over `categories` with a provided scraper (for testing).
    pub async fn harvest<C: AmazonSearch + 'static>(
        &self,
        scraper: Arc<Scraper<C>>,
        categories: &[CategoryDescriptor],
    ) -> HarvestSummary {
        let dispatcher = Dispatcher::new(
            scraper,
            ProductStore::new(self.config.products_dir.clone()),
            self.checkpoint(),
            HarvestOptions::from_config(&self.config),
        );
        dispatcher.run(categories).await
    }

    fn checkpoint(&self) -> CheckpointStore {
        CheckpointStore::for_market(&self.config.state_dir, self.config.market)
    }

    /// Loads the category file and applies the request's filters.
    pub fn select_categories(&self, request: &ScrapeRequest) -> Result<Vec<CategoryDescriptor>> {
        let mut categories = load_categories(&request.categories_file)?;

        if let Some(id) = &request.category {
            categories.retain(|c| &c.id == id);
            if categories.is_empty() {
                anyhow::bail!(
                    "Category '{}' not found in {}",
                    id,
                    request.categories_file.display()
                );
            }
        }

        if request.single {
            let completed = self.checkpoint().load();
            categories = categories.into_iter().filter(|c| !completed.contains(&c.id)).take(1).collect();
            match categories.first() {
                Some(c) => info!("Single category run: {} ({})", c.id, c.name),
                None => info!("All categories already completed"),
            }
        }

        if let Some(quota) = request.quota {
            for category in &mut categories {
                category.product_quota = Some(quota);
            }
        }

        Ok(categories)
    }
}
