//! Platform-aware product field extraction
//!
//! Resolves a selector table for `(platform, site)` and pulls normalized
//! fields out of the loaded page. Every field is independently
//! fault-tolerant: a missing or broken field yields its default and the
//! record survives.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::domain::product::{ExtractionTask, Platform, ProductRecord, StockStatus};
use crate::extraction::price::{
    clean_price_text, find_currency_amounts, parse_amount, shortest_amount, PRICE_UNAVAILABLE,
    ZERO_PRICE,
};
use crate::extraction::selectors::{SelectorRegistry, SelectorTable};
use crate::infrastructure::page::PageInspector;

/// Sold-out phrases, checked before in-stock phrases.
const OUT_OF_STOCK_PHRASES: &[&str] = &[
    "agotado",
    "sin stock",
    "out of stock",
    "no disponible",
    "sold out",
    "producto no disponible",
];

const IN_STOCK_PHRASES: &[&str] = &[
    "en stock",
    "in stock",
    "stock disponible",
    "disponible",
    "unidades",
    "últimas",
    "hay existencias",
];

static QUANTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,4})\b").expect("valid quantity regex"));

static SKU_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bsku:?\s*([A-Za-z0-9][A-Za-z0-9_-]*)").expect("valid sku regex")
});

static BRAND_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bmarca:?\s+([A-Za-zÁÉÍÓÚÑáéíóúñ0-9][A-Za-zÁÉÍÓÚÑáéíóúñ0-9.-]*)")
        .expect("valid brand regex")
});

static PRESENTATION_TEXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bpresentaci[oó]n:?\s+([^.;\n]{2,60})").expect("valid presentation regex")
});

fn classify_stock_text(text: &str) -> StockStatus {
    let lower = text.to_lowercase();
    if OUT_OF_STOCK_PHRASES.iter().any(|p| lower.contains(p)) {
        return StockStatus::OutOfStock;
    }
    if IN_STOCK_PHRASES.iter().any(|p| lower.contains(p)) {
        return StockStatus::InStock;
    }
    StockStatus::Unknown
}

/// A 1–4 digit number in the matched stock text, kept only inside
/// [0, 10000).
fn quantity_from(text: &str) -> Option<u32> {
    QUANTITY_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|qty| *qty < 10_000)
}

fn capitalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last meaningful path segment, hyphens to spaces, capitalized.
fn name_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return String::new();
    };
    let segment = parsed
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .next_back()
        .unwrap_or("");
    let trimmed = segment
        .trim_end_matches(".html")
        .trim_end_matches("-_JM")
        .replace('-', " ");
    capitalize_words(&trimmed)
}

fn name_from_page_title(title: &str) -> String {
    let head = title
        .split(&['|', '–'][..])
        .next()
        .unwrap_or(title);
    // " - " separated site suffixes; a plain hyphen inside a name stays.
    head.split(" - ").next().unwrap_or(head).trim().to_string()
}

/// Platform-aware field extraction over the page-inspection seam.
pub struct FieldExtractor {
    registry: SelectorRegistry,
}

impl FieldExtractor {
    pub fn new(registry: SelectorRegistry) -> Self {
        Self { registry }
    }

    pub fn with_builtin() -> Self {
        Self::new(SelectorRegistry::builtin())
    }

    /// Extract one normalized record from a page already classified as a
    /// product.
    pub fn extract(&self, page: &dyn PageInspector, task: &ExtractionTask) -> ProductRecord {
        let table = self.registry.resolve(task.platform, &task.site_id);
        let mut record = ProductRecord::empty(task);

        record.name = self.extract_name(page, table);
        let (stock, quantity) = self.extract_stock(page, table);
        record.stock = stock;
        record.quantity = quantity;
        let (raw_price, price) = self.extract_price(page, table, task.platform, stock);
        record.raw_price = raw_price;
        record.price = price;
        record.image_url = self.extract_image(page, table, &task.url);
        record.description = self.extract_description(page, table);
        record.specifications = self.extract_specifications(page, table);
        record.sku = self.extract_sku(page, table);
        record.brand = self.extract_brand(page, table);
        record.presentation = self.extract_presentation(page, table);
        record
    }

    fn extract_name(&self, page: &dyn PageInspector, table: &SelectorTable) -> String {
        if let Some(name) = page.select_text(&table.title) {
            return name;
        }
        if let Some(name) = page.select_text("h1") {
            return name;
        }
        if let Some(title) = page.title() {
            let name = name_from_page_title(&title);
            if !name.is_empty() {
                return name;
            }
        }
        debug!(url = page.url(), "name fell back to url slug");
        name_from_url(page.url())
    }

    fn extract_stock(
        &self,
        page: &dyn PageInspector,
        table: &SelectorTable,
    ) -> (StockStatus, Option<u32>) {
        let matched_text = table
            .stock_override
            .as_ref()
            .and_then(|sel| page.select_text(sel))
            .or_else(|| {
                table
                    .stock
                    .iter()
                    .find_map(|sel| page.select_text(sel))
            });

        if let Some(text) = &matched_text {
            match classify_stock_text(text) {
                StockStatus::OutOfStock => return (StockStatus::OutOfStock, None),
                StockStatus::InStock => return (StockStatus::InStock, quantity_from(text)),
                StockStatus::Unknown => {}
            }
        }

        if page.exists(&table.disabled_purchase_control) {
            return (StockStatus::OutOfStock, None);
        }

        let body = page.body_text().to_lowercase();
        if OUT_OF_STOCK_PHRASES.iter().any(|p| body.contains(p)) {
            return (StockStatus::OutOfStock, None);
        }
        if IN_STOCK_PHRASES.iter().any(|p| body.contains(p)) {
            let quantity = matched_text.as_deref().and_then(quantity_from);
            return (StockStatus::InStock, quantity);
        }
        (StockStatus::Unknown, None)
    }

    fn extract_price(
        &self,
        page: &dyn PageInspector,
        table: &SelectorTable,
        platform: Platform,
        stock: StockStatus,
    ) -> (String, Option<f64>) {
        let mut raw: Option<String> = None;

        // Mercado Shops renders symbol, integer part and cents in
        // separate sibling nodes.
        if platform == Platform::Mercadoshops {
            if let (Some(symbol_sel), Some(value_sel)) = (&table.price_symbol, &table.price_value)
            {
                if let (Some(symbol), Some(value)) =
                    (page.select_text(symbol_sel), page.select_text(value_sel))
                {
                    let cents = table
                        .price_cents
                        .as_ref()
                        .and_then(|sel| page.select_text(sel));
                    raw = Some(match cents {
                        Some(cents) => format!("{symbol} {value},{cents}"),
                        None => format!("{symbol} {value}"),
                    });
                }
            }
        }

        if raw.is_none() {
            raw = table.price.iter().find_map(|sel| page.select_text(sel));
        }

        if raw.is_none() {
            raw = shortest_amount(find_currency_amounts(&page.body_text()));
            if raw.is_some() {
                debug!(url = page.url(), "price recovered by page-wide scan");
            }
        }

        match raw {
            Some(raw) => {
                let cleaned = clean_price_text(&raw);
                let amount = parse_amount(&cleaned);
                (cleaned, amount)
            }
            None if stock == StockStatus::OutOfStock => (PRICE_UNAVAILABLE.to_string(), None),
            None => (ZERO_PRICE.to_string(), None),
        }
    }

    fn extract_image(
        &self,
        page: &dyn PageInspector,
        table: &SelectorTable,
        base_url: &str,
    ) -> String {
        let src = page
            .select_attr(&table.image, "src")
            .or_else(|| page.select_attr("meta[property='og:image']", "content"));
        let Some(src) = src else {
            return String::new();
        };
        // Storefronts emit relative gallery paths.
        match Url::parse(&src) {
            Ok(_) => src,
            Err(_) => Url::parse(base_url)
                .and_then(|base| base.join(&src))
                .map(|joined| joined.to_string())
                .unwrap_or(src),
        }
    }

    fn extract_description(&self, page: &dyn PageInspector, table: &SelectorTable) -> String {
        table
            .description
            .iter()
            .find_map(|sel| page.select_text(sel))
            .unwrap_or_default()
    }

    /// Merge two-cell table rows and colon-separated list lines into one
    /// mapping; table rows win on key collisions.
    fn extract_specifications(
        &self,
        page: &dyn PageInspector,
        table: &SelectorTable,
    ) -> BTreeMap<String, String> {
        let mut specs = BTreeMap::new();
        for (key, value) in page.select_pairs(&table.spec_rows) {
            if !value.is_empty() {
                specs.entry(key).or_insert(value);
            }
        }
        for line in page.select_all_text(&table.spec_list) {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim();
                if !key.is_empty() && !value.is_empty() && key.len() <= 60 {
                    specs.entry(key.to_string()).or_insert_with(|| value.to_string());
                }
            }
        }
        specs
    }

    fn extract_sku(&self, page: &dyn PageInspector, table: &SelectorTable) -> Option<String> {
        if let Some(sel) = &table.sku {
            if let Some(text) = page.select_text(sel) {
                let cleaned = SKU_TEXT_RE
                    .captures(&text)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or(text);
                return Some(cleaned);
            }
        }
        SKU_TEXT_RE
            .captures(&page.body_text())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn extract_brand(&self, page: &dyn PageInspector, table: &SelectorTable) -> Option<String> {
        if let Some(sel) = &table.brand {
            if let Some(text) = page.select_text(sel) {
                return Some(text);
            }
        }
        BRAND_TEXT_RE
            .captures(&page.body_text())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn extract_presentation(
        &self,
        page: &dyn PageInspector,
        table: &SelectorTable,
    ) -> Option<String> {
        if let Some(sel) = &table.presentation {
            if let Some(text) = page.select_text(sel) {
                return Some(text);
            }
        }
        PRESENTATION_TEXT_RE
            .captures(&page.body_text())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::with_builtin()
    }
}
