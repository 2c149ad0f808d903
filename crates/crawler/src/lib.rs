//! Catalog crawler: sitemap discovery, incremental page fetching, restock
//! detection and delisting reconciliation.

pub mod config;
pub mod differ;
pub mod fetcher;
pub mod parser;
pub mod reconcile;
pub mod sitemap;

pub use differ::{CrawlDiffer, CrawlReport, CrawlSettings};
