//! Per-site selector tables
//!
//! Extraction selectors are registered per `(platform, site)` with one
//! generic default table per platform. Adding a site is a table
//! insertion, not a code branch.

use std::collections::HashMap;

use crate::domain::product::Platform;

/// CSS selectors used to pull product fields out of a page. Price, stock
/// and description selectors are ordered fallback chains.
#[derive(Debug, Clone)]
pub struct SelectorTable {
    pub title: String,
    pub image: String,
    pub price: Vec<String>,
    /// Currency symbol and integer value rendered in separate sibling
    /// nodes, plus an optional cents node (Mercado Shops quirk).
    pub price_symbol: Option<String>,
    pub price_value: Option<String>,
    pub price_cents: Option<String>,
    pub stock: Vec<String>,
    /// Labeled stock block taking priority over the fallback chain.
    pub stock_override: Option<String>,
    pub description: Vec<String>,
    /// Rows of a specification table; two-cell rows become key/value pairs.
    pub spec_rows: String,
    /// Bullet-list items; colon-separated lines become key/value pairs.
    pub spec_list: String,
    pub sku: Option<String>,
    pub brand: Option<String>,
    pub presentation: Option<String>,
    pub disabled_purchase_control: String,
}

impl SelectorTable {
    fn woocommerce_default() -> Self {
        Self {
            title: "h1.product_title, h1.entry-title".to_string(),
            image: ".woocommerce-product-gallery__image img, img.wp-post-image".to_string(),
            price: vec![
                ".summary .price ins .woocommerce-Price-amount".to_string(),
                ".summary .price .woocommerce-Price-amount".to_string(),
                ".price .woocommerce-Price-amount".to_string(),
                ".price".to_string(),
                "[itemprop='price']".to_string(),
            ],
            price_symbol: None,
            price_value: None,
            price_cents: None,
            stock: vec![
                ".summary .stock".to_string(),
                ".stock".to_string(),
                ".availability".to_string(),
            ],
            stock_override: None,
            description: vec![
                ".woocommerce-product-details__short-description".to_string(),
                "#tab-description".to_string(),
                ".woocommerce-Tabs-panel--description".to_string(),
            ],
            spec_rows: "table.woocommerce-product-attributes tr, table.shop_attributes tr"
                .to_string(),
            spec_list: ".woocommerce-product-details__short-description li".to_string(),
            sku: Some(".product_meta .sku, [itemprop='sku']".to_string()),
            brand: Some("[itemprop='brand'], .product-brand".to_string()),
            presentation: Some(".product-presentation".to_string()),
            disabled_purchase_control:
                "button.single_add_to_cart_button[disabled], button.single_add_to_cart_button.disabled"
                    .to_string(),
        }
    }

    fn mercadoshops_default() -> Self {
        Self {
            title: "h1.ui-pdp-title".to_string(),
            image: ".ui-pdp-gallery img, figure.ui-pdp-gallery__figure img".to_string(),
            price: vec![
                ".ui-pdp-price__second-line .andes-money-amount".to_string(),
                ".andes-money-amount".to_string(),
            ],
            price_symbol: Some(".andes-money-amount__currency-symbol".to_string()),
            price_value: Some(".andes-money-amount__fraction".to_string()),
            price_cents: Some(".andes-money-amount__cents".to_string()),
            stock: vec![
                ".ui-pdp-stock-information__title".to_string(),
                ".ui-pdp-buybox__quantity__available".to_string(),
            ],
            stock_override: Some(".ui-pdp-stock-information".to_string()),
            description: vec![".ui-pdp-description__content".to_string()],
            spec_rows: ".ui-pdp-specs__table tr, .andes-table tr".to_string(),
            spec_list: ".ui-pdp-specs__list li, .ui-vpp-highlighted-specs__features-list li"
                .to_string(),
            sku: None,
            brand: None,
            presentation: None,
            disabled_purchase_control:
                ".ui-pdp-actions button.andes-button--loud[disabled]".to_string(),
        }
    }
}

/// Registry of selector tables keyed by `(platform, site)`, with one
/// generic default per platform.
pub struct SelectorRegistry {
    site_tables: HashMap<(Platform, String), SelectorTable>,
    woocommerce_default: SelectorTable,
    mercadoshops_default: SelectorTable,
}

impl SelectorRegistry {
    /// Registry with the generic per-platform defaults and no site
    /// overrides.
    pub fn builtin() -> Self {
        Self {
            site_tables: HashMap::new(),
            woocommerce_default: SelectorTable::woocommerce_default(),
            mercadoshops_default: SelectorTable::mercadoshops_default(),
        }
    }

    /// Register a site-specific table; replaces any earlier entry.
    pub fn register(&mut self, platform: Platform, site_id: impl Into<String>, table: SelectorTable) {
        self.site_tables.insert((platform, site_id.into()), table);
    }

    /// Site-specific table when registered, platform default otherwise.
    pub fn resolve(&self, platform: Platform, site_id: &str) -> &SelectorTable {
        self.site_tables
            .get(&(platform, site_id.to_string()))
            .unwrap_or_else(|| match platform {
                Platform::Woocommerce => &self.woocommerce_default,
                Platform::Mercadoshops => &self.mercadoshops_default,
            })
    }
}

impl Default for SelectorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
