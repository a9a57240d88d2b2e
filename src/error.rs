//! Engine error taxonomy.
//!
//! Errors are grouped by the recovery policy attached to them: sitemap
//! failures yield an empty URL list, fetch/extraction failures are retried
//! up to the configured limit, session failures abort a single domain batch,
//! and store failures are propagated per product.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoutError {
    /// A sitemap (or sub-sitemap) could not be fetched. The sitemap
    /// contributes zero URLs; the run continues.
    #[error("sitemap fetch failed for {url}: {reason}")]
    SitemapFetch { url: String, reason: String },

    /// A sitemap body could not be parsed as XML.
    #[error("sitemap parse failed for {url}: {reason}")]
    SitemapParse { url: String, reason: String },

    /// Navigation or page load failure. Retryable.
    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// A fetch session could not be opened for a domain. Fails that
    /// domain's whole batch.
    #[error("session could not be opened for {domain}: {reason}")]
    Session { domain: String, reason: String },

    /// Store operation failure, propagated to the caller per product.
    #[error("store operation failed: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<sqlx::Error> for ScoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}
