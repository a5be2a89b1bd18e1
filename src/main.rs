//! amz-harvest - Resumable Amazon catalog scraper
//!
//! A Rust implementation with TLS fingerprint emulation for reliable scraping.

use amz_harvest::amazon::markets::Market;
use amz_harvest::commands::{ProductCommand, ScrapeCommand, ScrapeRequest, SearchCommand};
use amz_harvest::config::{Config, OutputFormat};
use amz_harvest::format::Formatter;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "amz-harvest",
    version,
    about = "Resumable Amazon catalog scraper",
    long_about = "Harvests Amazon products for a category tree with TLS fingerprint emulation, \
                  session rotation and per-market checkpoints."
)]
struct Cli {
    /// Amazon marketplace (overrides config and AMZ_MARKET)
    #[arg(short, long, global = true)]
    market: Option<Market>,

    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "AMZ_PROXY")]
    proxy: Option<String>,

    /// Delay between requests in milliseconds
    #[arg(long, global = true)]
    delay: Option<u64>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest products for every category in a category file
    Scrape {
        /// JSON array of category descriptors
        categories: PathBuf,

        /// Only scrape this category id
        #[arg(long)]
        category: Option<String>,

        /// Only scrape the first category not yet completed
        #[arg(long)]
        single: bool,

        /// Products per category, overriding the file
        #[arg(short, long)]
        quota: Option<usize>,

        /// Directory for product JSON files
        #[arg(long, env = "AMZ_PRODUCTS_DIR")]
        products_dir: Option<PathBuf>,
    },

    /// Extract one search results page
    #[command(alias = "s")]
    Search {
        /// Search query
        query: String,

        /// Results page number
        #[arg(short, long, default_value = "1")]
        page: u32,
    },

    /// Look up products by ASIN
    #[command(alias = "p")]
    Product {
        /// ASIN(s) to look up
        #[arg(required = true)]
        asins: Vec<String>,
    },

    /// List supported marketplaces
    Markets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(market) = cli.market {
        config.market = market;
    }
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(delay) = cli.delay {
        config.delay_ms = delay;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }

    match cli.command {
        Commands::Scrape { categories, category, single, quota, products_dir } => {
            if let Some(dir) = products_dir {
                config.products_dir = dir;
            }

            let request = ScrapeRequest { categories_file: categories, category, single, quota };
            let output = ScrapeCommand::new(config).execute(&request).await?;
            println!("{}", output);
        }

        Commands::Search { query, page } => {
            let output = SearchCommand::new(config).execute(&query, page.max(1)).await?;
            println!("{}", output);
        }

        Commands::Product { asins } => {
            let output = ProductCommand::new(config).execute(&asins).await?;
            println!("{}", output);
        }

        Commands::Markets => {
            println!("{}", Formatter::new(config.format).format_markets());
        }
    }

    Ok(())
}
