//! Heuristic product-page classifier
//!
//! A weighted-signal scorer over the loaded page. The rule set is a
//! single named-weight table shared by both platform variants so the
//! heuristic cannot drift between them. The threshold trades precision
//! for recall: a false positive costs one wasted extraction, a false
//! negative silently drops a real product.

use serde::Serialize;

use crate::domain::product::Platform;
use crate::domain::url_rules;
use crate::infrastructure::page::PageInspector;

/// Named weights for every classifier signal, with a version so stored
/// verdicts can be traced back to the rule set that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct SignalWeights {
    pub version: u32,
    pub threshold: u32,
    pub purchase_control: u32,
    pub price_element: u32,
    pub title_element: u32,
    pub media_gallery: u32,
    pub product_form_marker: u32,
    pub product_meta_marker: u32,
    pub stock_indicator: u32,
    pub purchase_phrases: u32,
    pub sku_element: u32,
    pub product_url_pattern: u32,
    pub stock_comment: u32,
    pub checkout_form: u32,
    pub strong_url_indicator: u32,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            version: 1,
            threshold: 3,
            purchase_control: 2,
            price_element: 2,
            title_element: 1,
            media_gallery: 1,
            product_form_marker: 2,
            product_meta_marker: 2,
            stock_indicator: 1,
            purchase_phrases: 1,
            sku_element: 2,
            product_url_pattern: 2,
            stock_comment: 2,
            checkout_form: 3,
            strong_url_indicator: 3,
        }
    }
}

/// Signal vector observed on one page. Scoring is a pure function of
/// this vector and monotonic in every field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignals {
    pub purchase_control: bool,
    pub price_element: bool,
    pub title_element: bool,
    pub media_gallery: bool,
    pub product_form_marker: bool,
    pub product_meta_marker: bool,
    pub stock_indicator: bool,
    pub purchase_phrases: bool,
    pub sku_element: bool,
    pub product_url_pattern: bool,
    pub stock_comment: bool,
    pub checkout_form: bool,
    pub strong_url_indicator: bool,
}

impl PageSignals {
    pub fn score(&self, weights: &SignalWeights) -> u32 {
        let mut score = 0;
        let mut add = |present: bool, weight: u32| {
            if present {
                score += weight;
            }
        };
        add(self.purchase_control, weights.purchase_control);
        add(self.price_element, weights.price_element);
        add(self.title_element, weights.title_element);
        add(self.media_gallery, weights.media_gallery);
        add(self.product_form_marker, weights.product_form_marker);
        add(self.product_meta_marker, weights.product_meta_marker);
        add(self.stock_indicator, weights.stock_indicator);
        add(self.purchase_phrases, weights.purchase_phrases);
        add(self.sku_element, weights.sku_element);
        add(self.product_url_pattern, weights.product_url_pattern);
        add(self.stock_comment, weights.stock_comment);
        add(self.checkout_form, weights.checkout_form);
        add(self.strong_url_indicator, weights.strong_url_indicator);
        score
    }
}

const PURCHASE_CONTROL_SEL: &str = "button.single_add_to_cart_button, button[name='add-to-cart'], \
     .add-to-cart, form.cart button[type='submit'], .ui-pdp-actions button.andes-button--loud";

const PRICE_SEL: &str =
    ".price, .product-price, .precio, [itemprop='price'], .andes-money-amount, .woocommerce-Price-amount";

const TITLE_SEL: &str = "h1.product_title, h1.ui-pdp-title, h1.entry-title, h1";

const GALLERY_SEL: &str =
    ".woocommerce-product-gallery, .product-gallery, .ui-pdp-gallery, .product-images";

const STOCK_SEL: &str = ".stock, .availability, .in-stock, .out-of-stock, .ui-pdp-stock-information";

const SKU_SEL: &str = ".sku, [itemprop='sku'], .product_meta .sku";

const CHECKOUT_FORM_SEL: &str =
    "form[action*='checkout'], form[action*='carrito'], form[action*='comprar']";

const META_MARKER_SEL: &str =
    "meta[property='og:type'][content='product'], [itemtype*='schema.org/Product']";

const PURCHASE_PHRASES: &[&str] = &[
    "añadir al carrito",
    "agregar al carrito",
    "comprar ahora",
    "disponibilidad",
    "stock disponible",
    "en stock",
    "agotado",
];

const STOCK_COMMENT_MARKERS: &[&str] = &["stock", "agotado", "disponible"];

fn form_marker_selector(platform: Platform) -> &'static str {
    match platform {
        Platform::Woocommerce => "form.cart, body.single-product",
        Platform::Mercadoshops => ".ui-pdp-container, .ui-pdp-actions form",
    }
}

/// Scan HTML comments for stock-state markers left by server-side
/// templates.
fn has_stock_comment(raw_html: &str) -> bool {
    let lower = raw_html.to_lowercase();
    let mut rest = lower.as_str();
    while let Some(start) = rest.find("<!--") {
        let after = &rest[start + 4..];
        let end = after.find("-->").unwrap_or(after.len());
        let comment = &after[..end];
        if STOCK_COMMENT_MARKERS.iter().any(|m| comment.contains(m)) {
            return true;
        }
        rest = &after[end..];
    }
    false
}

/// Collect the signal vector for a loaded page.
pub fn collect_signals(page: &dyn PageInspector, platform: Platform) -> PageSignals {
    let body = page.body_text().to_lowercase();
    PageSignals {
        purchase_control: page.exists(PURCHASE_CONTROL_SEL),
        price_element: page.exists(PRICE_SEL),
        title_element: page.exists(TITLE_SEL),
        media_gallery: page.exists(GALLERY_SEL),
        product_form_marker: page.exists(form_marker_selector(platform)),
        product_meta_marker: page.exists(META_MARKER_SEL),
        stock_indicator: page.exists(STOCK_SEL),
        purchase_phrases: PURCHASE_PHRASES.iter().any(|p| body.contains(p)),
        sku_element: page.exists(SKU_SEL),
        product_url_pattern: url_rules::has_product_url_pattern(page.url()),
        stock_comment: has_stock_comment(page.raw_html()),
        checkout_form: page.exists(CHECKOUT_FORM_SEL),
        strong_url_indicator: url_rules::has_strong_platform_indicator(page.url(), platform),
    }
}

/// Classification verdict with the score that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub is_product: bool,
    pub score: u32,
}

/// Decides whether a loaded page is genuinely a product page.
#[derive(Default)]
pub struct ProductClassifier {
    weights: SignalWeights,
}

impl ProductClassifier {
    pub fn new(weights: SignalWeights) -> Self {
        Self { weights }
    }

    pub fn classify(&self, page: &dyn PageInspector, platform: Platform) -> Verdict {
        let signals = collect_signals(page, platform);
        let score = signals.score(&self.weights);
        Verdict {
            is_product: score >= self.weights.threshold,
            score,
        }
    }
}
