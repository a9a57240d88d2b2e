//! Domain module - core entities and domain services
//!
//! Contains the record types flowing through the extraction pipeline,
//! the URL admission rules shared by discovery and scheduling, and the
//! keyword taxonomy used to categorize extracted products.

pub mod product;
pub mod taxonomy;
pub mod url_rules;

pub use product::{
    CategoryAssignment, ExtractionTask, Platform, ProductRecord, RecordOutcome, ScrapeLogEntry,
    ScrapeStatus, SitemapEntry, SitemapKind, SitemapSource, StockStatus,
};
