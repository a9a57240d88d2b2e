//! Configuration infrastructure
//!
//! Serde-backed configuration loaded from an optional TOML file plus
//! `TIENDA_SCOUT__`-prefixed environment overrides. Every field has a
//! default so the engine runs with an empty config file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::product::{Platform, SitemapKind, SitemapSource};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Storefronts to crawl.
    pub sites: Vec<SiteConfig>,
    pub crawler: CrawlerConfig,
    pub governor: GovernorConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// One storefront: its sitemap and platform family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub id: String,
    pub platform: Platform,
    pub sitemap_url: String,
    pub sitemap_kind: SitemapKind,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            platform: Platform::Woocommerce,
            sitemap_url: String::new(),
            sitemap_kind: SitemapKind::Direct,
        }
    }
}

impl SiteConfig {
    pub fn sitemap_source(&self) -> SitemapSource {
        SitemapSource {
            url: self.sitemap_url.clone(),
            site_id: self.id.clone(),
            platform: self.platform,
            kind: self.sitemap_kind,
        }
    }
}

/// Fetch-session behavior: politeness, retries and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Delay between requests within one domain, in milliseconds.
    pub request_delay_ms: u64,

    /// Retries per URL after the first attempt.
    pub max_retries: u32,

    /// Base backoff applied as `retry_backoff_ms * retry_count`.
    pub retry_backoff_ms: u64,

    /// Page navigation timeout in seconds.
    pub navigation_timeout_secs: u64,

    /// Settle period after navigation for late-loading content, in
    /// milliseconds.
    pub settle_delay_ms: u64,

    pub user_agent: String,

    /// Token-bucket cap per fetch session.
    pub max_requests_per_second: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1500,
            max_retries: 3,
            retry_backoff_ms: 2000,
            navigation_timeout_secs: 30,
            settle_delay_ms: 500,
            user_agent: "tienda-scout/0.3 (+https://github.com/tienda-scout)".to_string(),
            max_requests_per_second: 4,
        }
    }
}

/// Adaptive concurrency bound settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub initial_bound: usize,
    pub min_bound: usize,
    pub max_bound: usize,

    /// Minimum seconds between bound adjustments.
    pub window_secs: u64,

    /// Errors in a window above which the bound is lowered.
    pub error_threshold: u32,

    /// Successes in a clean window above which the bound is raised.
    pub success_threshold: u32,

    /// Memory utilization percentage treated as host pressure.
    pub memory_pressure_pct: f64,

    /// 1-minute load average as a percentage of core count treated as
    /// host pressure.
    pub load_pressure_pct: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            initial_bound: 4,
            min_bound: 2,
            max_bound: 8,
            window_secs: 30,
            error_threshold: 5,
            success_threshold: 10,
            memory_pressure_pct: 80.0,
            load_pressure_pct: 80.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
    /// Directory for the per-run JSON output files.
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://tienda-scout.db?mode=rwc".to_string(),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
    /// Emit JSON-formatted logs.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the given file (if any) merged with
    /// environment overrides (`TIENDA_SCOUT__CRAWLER__MAX_RETRIES=5`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        } else if let Some(default_path) = Self::default_config_path() {
            builder = builder.add_source(config::File::from(default_path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("TIENDA_SCOUT").separator("__"),
        );
        let settings = builder.build().context("failed to assemble configuration")?;
        settings
            .try_deserialize()
            .context("failed to deserialize configuration")
    }

    fn default_config_path() -> Option<PathBuf> {
        let local = PathBuf::from("tienda-scout.toml");
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir().map(|dir| dir.join("tienda-scout").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_contract() {
        let config = AppConfig::default();
        assert_eq!(config.governor.initial_bound, 4);
        assert_eq!(config.governor.min_bound, 2);
        assert_eq!(config.governor.max_bound, 8);
        assert_eq!(config.governor.window_secs, 30);
        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(config.crawler.retry_backoff_ms, 2000);
    }

    #[test]
    fn site_config_round_trips_from_toml() {
        let toml = r#"
            [[sites]]
            id = "tienda-example"
            platform = "woocommerce"
            sitemap_url = "https://tienda.example.pe/sitemap_index.xml"
            sitemap_kind = "index"

            [crawler]
            max_retries = 5
        "#;
        let config: AppConfig = toml_from_str(toml);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].sitemap_kind, SitemapKind::Index);
        assert_eq!(config.crawler.max_retries, 5);
        assert_eq!(config.crawler.request_delay_ms, 1500); // default kept
    }

    fn toml_from_str(raw: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
