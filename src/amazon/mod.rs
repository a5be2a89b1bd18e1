//! Amazon-specific modules: sessions, retrying client, extraction and data models.

pub mod client;
pub mod extract;
pub mod markets;
pub mod models;
pub mod parser;
pub mod retry;
pub mod selectors;
pub mod session;

pub use client::{AmazonClient, AmazonSearch, ClientStats};
pub use markets::Market;
pub use models::{ListingPage, ListingStub, Price, ProductId, ProductRecord, Rating};
pub use parser::{Parser, SyntheticIds};
