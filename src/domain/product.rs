//! Core record types for the extraction pipeline.
//!
//! A `SitemapEntry` discovered during sitemap resolution becomes an
//! `ExtractionTask`, which terminates in exactly one `ProductRecord`:
//! a successful extraction, a non-product verdict, or a terminal error.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend platform family a storefront runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Woocommerce,
    Mercadoshops,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Woocommerce => "woocommerce",
            Self::Mercadoshops => "mercadoshops",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock availability resolved from page signals.
///
/// Precedence when resolving: explicit sold-out signals beat explicit
/// in-stock signals, which beat a disabled purchase control; anything
/// else is `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    #[default]
    Unknown,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::OutOfStock => "out_of_stock",
            Self::Unknown => "unknown",
        }
    }
}

/// How a sitemap descriptor should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapKind {
    /// `<sitemapindex>` of sub-sitemaps; only product sub-sitemaps are followed.
    Index,
    /// Plain `<urlset>` of leaf URLs.
    #[default]
    Direct,
}

/// A sitemap to resolve for one site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapSource {
    pub url: String,
    pub site_id: String,
    pub platform: Platform,
    #[serde(default)]
    pub kind: SitemapKind,
}

/// One candidate URL produced by sitemap resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub url: String,
    pub site_id: String,
    pub platform: Platform,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Unit of work consumed by a domain session.
#[derive(Debug, Clone)]
pub struct ExtractionTask {
    pub url: String,
    pub site_id: String,
    pub platform: Platform,
    pub retry_count: u32,
}

impl ExtractionTask {
    pub fn from_entry(entry: &SitemapEntry) -> Self {
        Self {
            url: entry.url.clone(),
            site_id: entry.site_id.clone(),
            platform: entry.platform,
            retry_count: 0,
        }
    }
}

/// Terminal outcome kind of an extraction task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Page classified as a product and fields were extracted.
    Extracted,
    /// Page was filtered or failed product classification. Informational,
    /// not an error; the reason lands in `error`.
    NonProduct,
    /// All retries exhausted; `error` carries the last failure message.
    Failed,
}

/// Normalized product data for one URL. Uniquely identified by
/// `(site_id, link)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub raw_price: String,
    /// Finite non-negative amount with a period decimal separator, or
    /// `None` when no price could be observed.
    pub price: Option<f64>,
    pub stock: StockStatus,
    pub quantity: Option<u32>,
    pub link: String,
    pub image_url: String,
    pub site_id: String,
    pub platform: Platform,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub presentation: Option<String>,
    pub description: String,
    pub specifications: BTreeMap<String, String>,
    pub outcome: RecordOutcome,
    pub scraped_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl ProductRecord {
    /// Empty record skeleton for a task; fields are filled by the extractor.
    pub fn empty(task: &ExtractionTask) -> Self {
        Self {
            name: String::new(),
            raw_price: String::new(),
            price: None,
            stock: StockStatus::Unknown,
            quantity: None,
            link: task.url.clone(),
            image_url: String::new(),
            site_id: task.site_id.clone(),
            platform: task.platform,
            sku: None,
            brand: None,
            presentation: None,
            description: String::new(),
            specifications: BTreeMap::new(),
            outcome: RecordOutcome::Extracted,
            scraped_at: Utc::now(),
            error: None,
        }
    }

    /// Informational record for a URL that is not a product page.
    pub fn non_product(task: &ExtractionTask, reason: impl Into<String>) -> Self {
        let mut record = Self::empty(task);
        record.outcome = RecordOutcome::NonProduct;
        record.error = Some(reason.into());
        record
    }

    /// Terminal record after retry exhaustion or a domain-level failure.
    pub fn terminal_error(task: &ExtractionTask, message: impl Into<String>) -> Self {
        let mut record = Self::empty(task);
        record.outcome = RecordOutcome::Failed;
        record.error = Some(message.into());
        record
    }

    pub fn is_error(&self) -> bool {
        self.outcome == RecordOutcome::Failed
    }

    /// Identity hash over `(site_id, link)`; dedups records within a run.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.site_id.as_bytes());
        hasher.update(b"\x1f");
        hasher.update(self.link.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// Sentinel category used when no taxonomy keyword matches.
pub const OTHERS_CATEGORY: &str = "others";

/// One scored taxonomy match for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub slug: String,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStatus {
    Completed,
    Failed,
}

/// Per-domain, per-run scrape summary persisted to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeLogEntry {
    pub site_id: String,
    pub status: ScrapeStatus,
    pub products_processed: u32,
    pub error_count: u32,
    pub error_details: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
