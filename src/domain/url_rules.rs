//! URL admission rules shared by sitemap filtering, domain sessions and the
//! product-page classifier.
//!
//! The deny-list names storefront sections that are never product pages;
//! the Mercado Shops heuristic keeps only paths that look like product
//! slugs. Both operate on the URL path alone.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::domain::product::Platform;

/// Path segments of non-product storefront sections.
pub static NON_PRODUCT_SEGMENTS: &[&str] = &[
    "cart",
    "carrito",
    "checkout",
    "finalizar-compra",
    "pago",
    "account",
    "cuenta",
    "mi-cuenta",
    "login",
    "register",
    "registro",
    "search",
    "busqueda",
    "blog",
    "noticias",
    "contact",
    "contacto",
    "nosotros",
    "about",
    "quienes-somos",
    "terminos",
    "terminos-y-condiciones",
    "politicas",
    "politica-de-privacidad",
    "privacy",
    "wishlist",
    "favoritos",
    "comparar",
    "faq",
    "ayuda",
    "libro-de-reclamaciones",
];

static MARKETPLACE_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:mpe|mla|mlm|mlc|mco|mlu)-?\d{6,}").expect("valid marketplace item regex")
});

fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// True when the URL can never be a product page: unparseable, the
/// storefront root, or any path segment on the deny-list.
pub fn is_denied(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return true;
    };
    let segments = path_segments(&parsed);
    if segments.is_empty() {
        // Storefront root.
        return true;
    }
    segments
        .iter()
        .any(|segment| NON_PRODUCT_SEGMENTS.contains(&segment.as_str()))
}

/// Mercado Shops positive heuristic: a path is kept as a likely product
/// page when it has at least two segments, contains a hyphen, or contains
/// a digit.
pub fn looks_like_product_path(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let segments = path_segments(&parsed);
    if segments.is_empty() {
        return false;
    }
    let path = parsed.path();
    segments.len() >= 2 || path.contains('-') || path.chars().any(|c| c.is_ascii_digit())
}

/// Weak product-path signal used by the page classifier.
pub fn has_product_url_pattern(url: &str) -> bool {
    let lower = url.to_lowercase();
    ["/producto/", "/product/", "/item/", "/p/", "-p-"]
        .iter()
        .any(|pattern| lower.contains(pattern))
        || MARKETPLACE_ITEM_RE.is_match(url)
}

/// Strong platform-specific URL signal used by the page classifier.
pub fn has_strong_platform_indicator(url: &str, platform: Platform) -> bool {
    let lower = url.to_lowercase();
    match platform {
        Platform::Woocommerce => lower.contains("/producto/") || lower.contains("/product/"),
        Platform::Mercadoshops => MARKETPLACE_ITEM_RE.is_match(url) || lower.ends_with("-_jm"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://tienda.example.pe/carrito")]
    #[case("https://tienda.example.pe/checkout")]
    #[case("https://tienda.example.pe/mi-cuenta")]
    #[case("https://tienda.example.pe/blog/novedades-2024")]
    #[case("https://tienda.example.pe/busqueda?q=mouse")]
    #[case("https://tienda.example.pe/")]
    #[case("https://tienda.example.pe")]
    #[case("not a url")]
    fn deny_list_excludes_non_product_sections(#[case] url: &str) {
        assert!(is_denied(url), "{url} should be denied");
    }

    #[rstest]
    #[case("https://tienda.example.pe/producto/teclado-mecanico")]
    #[case("https://tienda.example.pe/MPE-628843770-mouse-gamer-_JM")]
    #[case("https://tienda.example.pe/categoria/perifericos")]
    fn deny_list_keeps_everything_else(#[case] url: &str) {
        assert!(!is_denied(url), "{url} should be kept");
    }

    #[rstest]
    #[case("https://shop.example.pe/listado/computacion", true)] // >= 2 segments
    #[case("https://shop.example.pe/mouse-gamer", true)] // hyphen
    #[case("https://shop.example.pe/MPE628843770", true)] // digit
    #[case("https://shop.example.pe/ofertas", false)] // bare single segment
    #[case("https://shop.example.pe/", false)]
    fn marketplace_heuristic_retention(#[case] url: &str, #[case] kept: bool) {
        assert_eq!(looks_like_product_path(url), kept, "{url}");
    }

    #[test]
    fn strong_indicator_is_platform_specific() {
        let woo = "https://tienda.example.pe/producto/ssd-1tb";
        let shops = "https://shop.example.pe/MPE-628843770-ssd-1tb-_JM";
        assert!(has_strong_platform_indicator(woo, Platform::Woocommerce));
        assert!(!has_strong_platform_indicator(woo, Platform::Mercadoshops));
        assert!(has_strong_platform_indicator(shops, Platform::Mercadoshops));
    }
}
