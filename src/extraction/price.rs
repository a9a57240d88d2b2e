//! Price text cleaning and normalization
//!
//! Raw price strings arrive with label prefixes, stray whitespace and
//! mixed separator conventions. Cleaning is idempotent; normalization
//! resolves separators into one canonical convention.
//!
//! Canonical convention: normalized amounts are `f64` with a period
//! decimal separator. When both `.` and `,` appear, the rightmost one is
//! the decimal separator. A lone `,` followed by exactly two digits at
//! the end is decimal, otherwise thousands. A lone `.` followed by
//! exactly three digits is thousands (`1.234` → 1234), otherwise decimal
//! (`12.50` → 12.5).

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinel raw text when no price element matched at all.
pub const ZERO_PRICE: &str = "S/ 0.00";

/// Raw-text marker when no price matched and the product is out of stock.
pub const PRICE_UNAVAILABLE: &str = "Precio no disponible";

/// Label prefixes stripped from raw price text, longest first.
const PRICE_LABELS: &[&str] = &["precio web:", "precio:"];

static AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d.,]*").expect("valid amount regex"));

static CURRENCY_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:S/\.?|US\$|\$)\s*\d[\d.,]*").expect("valid currency regex")
});

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean a raw price string: first line only, label prefixes stripped,
/// currency symbol ensured, symbol/value whitespace collapsed.
/// Idempotent: cleaning a cleaned string returns it unchanged.
pub fn clean_price_text(raw: &str) -> String {
    let mut text = collapse_ws(raw.lines().next().unwrap_or(""));

    loop {
        let lower = text.to_lowercase();
        let Some(label) = PRICE_LABELS.iter().find(|l| lower.starts_with(**l)) else {
            break;
        };
        text = text[label.len()..].trim_start().to_string();
    }

    if text.is_empty() {
        return text;
    }

    if !text.contains("S/") && !text.contains('$') {
        text = format!("S/ {text}");
    }

    for symbol in ["S/", "$"] {
        if let Some(rest) = text.strip_prefix(symbol) {
            let rest = rest.trim_start();
            text = if rest.is_empty() {
                symbol.to_string()
            } else {
                format!("{symbol} {rest}")
            };
            break;
        }
    }

    text
}

/// Normalize a cleaned price string into an amount, or `None` when the
/// text carries no usable number.
pub fn parse_amount(text: &str) -> Option<f64> {
    let matched = AMOUNT_RE.find(text)?.as_str();
    let matched = matched.trim_end_matches(['.', ',']);
    let has_dot = matched.contains('.');
    let has_comma = matched.contains(',');

    let canonical = if has_dot && has_comma {
        let last_dot = matched.rfind('.').unwrap_or(0);
        let last_comma = matched.rfind(',').unwrap_or(0);
        if last_dot > last_comma {
            matched.replace(',', "")
        } else {
            matched.replace('.', "").replace(',', ".")
        }
    } else if has_comma {
        let parts: Vec<&str> = matched.split(',').collect();
        if parts.len() == 2 && parts[1].len() == 2 {
            format!("{}.{}", parts[0], parts[1])
        } else {
            matched.replace(',', "")
        }
    } else if has_dot {
        let parts: Vec<&str> = matched.split('.').collect();
        if parts.len() == 2 && parts[1].len() != 3 {
            matched.to_string()
        } else {
            matched.replace('.', "")
        }
    } else {
        matched.to_string()
    };

    let value = canonical.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// All currency-amount snippets present in a page's text.
pub fn find_currency_amounts(text: &str) -> Vec<String> {
    CURRENCY_AMOUNT_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The shortest currency match is the least likely to include
/// surrounding noise.
pub fn shortest_amount(mut amounts: Vec<String>) -> Option<String> {
    amounts.sort_by_key(String::len);
    amounts.into_iter().next()
}
