//! CLI command implementations.

pub mod product;
pub mod scrape;
pub mod search;

pub use product::ProductCommand;
pub use scrape::{ScrapeCommand, ScrapeRequest};
pub use search::SearchCommand;
