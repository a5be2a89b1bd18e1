//! amz-harvest - Resumable Amazon catalog scraper
//!
//! Searches a marketplace for every category of a category tree, extracts
//! listing and detail pages with TLS fingerprint emulation, and writes one
//! JSON file per product. Completed categories are checkpointed per market
//! so interrupted runs resume where they stopped.

pub mod amazon;
pub mod cache;
pub mod catalog;
pub mod checkpoint;
pub mod commands;
pub mod config;
pub mod format;
pub mod harvest;
pub mod store;

pub use amazon::models::{ListingPage, ListingStub, Price, ProductId, ProductRecord, Rating};
pub use amazon::markets::Market;
pub use config::Config;
