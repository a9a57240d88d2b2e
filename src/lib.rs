//! tienda-scout - sitemap-driven e-commerce product extraction engine
//!
//! Discovers product pages across WooCommerce and Mercado Shops
//! storefronts through their sitemaps, verifies each fetched page really
//! is a product page, extracts normalized fields, classifies products
//! into a keyword taxonomy, and persists results with price-history
//! tracking.

pub mod domain;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod infrastructure;
pub mod testing;

pub use engine::{CrawlEngine, RunReport, RunSummary};
pub use error::ScoutError;
