//! Page access abstractions
//!
//! Two seams keep extraction logic independent of any automation engine:
//! `FetchEngine`/`PageSession` cover navigation (one session per domain),
//! and `PageInspector` covers read-only DOM access on a loaded page.
//! Production uses a rate-limited HTTP session and `scraper`-backed
//! inspection; tests drive the same traits with canned fixtures.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::ScoutError;
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};

/// Read-only view of a loaded page. Selector strings may be comma-chained
/// fallback lists; an invalid selector behaves like a selector with no
/// matches.
pub trait PageInspector {
    fn url(&self) -> &str;

    /// Normalized text of the first element matching the selector.
    fn select_text(&self, selector: &str) -> Option<String>;

    /// Normalized text of every element matching the selector.
    fn select_all_text(&self, selector: &str) -> Vec<String>;

    /// Attribute value of the first element matching the selector.
    fn select_attr(&self, selector: &str, attr: &str) -> Option<String>;

    fn exists(&self, selector: &str) -> bool;

    /// Two-cell rows of elements matching a row selector, for
    /// specification tables.
    fn select_pairs(&self, row_selector: &str) -> Vec<(String, String)>;

    fn title(&self) -> Option<String>;

    fn body_text(&self) -> String;

    /// Raw document source, for signals living outside the DOM proper
    /// (stock-state HTML comments).
    fn raw_html(&self) -> &str;
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `scraper`-backed inspector over a fetched document.
pub struct HtmlPage {
    url: String,
    raw: String,
    doc: Html,
}

impl HtmlPage {
    pub fn parse(url: impl Into<String>, html: impl Into<String>) -> Self {
        let raw = html.into();
        let doc = Html::parse_document(&raw);
        Self {
            url: url.into(),
            raw,
            doc,
        }
    }

    fn compile(&self, selector: &str) -> Option<Selector> {
        match Selector::parse(selector) {
            Ok(sel) => Some(sel),
            Err(err) => {
                debug!(selector, %err, "unparseable selector ignored");
                None
            }
        }
    }
}

impl PageInspector for HtmlPage {
    fn url(&self) -> &str {
        &self.url
    }

    fn select_text(&self, selector: &str) -> Option<String> {
        let sel = self.compile(selector)?;
        self.doc
            .select(&sel)
            .next()
            .map(|el| normalize_ws(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|text| !text.is_empty())
    }

    fn select_all_text(&self, selector: &str) -> Vec<String> {
        let Some(sel) = self.compile(selector) else {
            return Vec::new();
        };
        self.doc
            .select(&sel)
            .map(|el| normalize_ws(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|text| !text.is_empty())
            .collect()
    }

    fn select_attr(&self, selector: &str, attr: &str) -> Option<String> {
        let sel = self.compile(selector)?;
        self.doc
            .select(&sel)
            .find_map(|el| el.value().attr(attr).map(|v| v.trim().to_string()))
            .filter(|value| !value.is_empty())
    }

    fn exists(&self, selector: &str) -> bool {
        self.compile(selector)
            .map(|sel| self.doc.select(&sel).next().is_some())
            .unwrap_or(false)
    }

    fn select_pairs(&self, row_selector: &str) -> Vec<(String, String)> {
        let Some(row_sel) = self.compile(row_selector) else {
            return Vec::new();
        };
        let Some(cell_sel) = self.compile("th, td") else {
            return Vec::new();
        };
        self.doc
            .select(&row_sel)
            .filter_map(|row| {
                let cells: Vec<String> = row
                    .select(&cell_sel)
                    .map(|cell| normalize_ws(&cell.text().collect::<Vec<_>>().join(" ")))
                    .collect();
                match cells.as_slice() {
                    [key, value] if !key.is_empty() => Some((key.clone(), value.clone())),
                    _ => None,
                }
            })
            .collect()
    }

    fn title(&self) -> Option<String> {
        self.select_text("title")
    }

    fn body_text(&self) -> String {
        self.select_text("body").unwrap_or_default()
    }

    fn raw_html(&self) -> &str {
        &self.raw
    }
}

/// Opens one fetch session per domain. Session state (cookies, rate
/// limiting) is never shared across domains.
#[async_trait]
pub trait FetchEngine: Send + Sync {
    async fn open_session(&self, domain: &str) -> Result<Box<dyn PageSession>, ScoutError>;
}

/// A live per-domain session. Navigation is bounded by the engine's
/// configured timeout and returns the raw document source.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<String, ScoutError>;
}

/// HTTP-backed fetch engine: one cookie-isolated, rate-limited client per
/// domain session.
pub struct HttpFetchEngine {
    config: HttpClientConfig,
}

impl HttpFetchEngine {
    pub fn new(config: HttpClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FetchEngine for HttpFetchEngine {
    async fn open_session(&self, domain: &str) -> Result<Box<dyn PageSession>, ScoutError> {
        let client = HttpClient::new(self.config.clone()).map_err(|e| ScoutError::Session {
            domain: domain.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(HttpPageSession { client }))
    }
}

struct HttpPageSession {
    client: HttpClient,
}

#[async_trait]
impl PageSession for HttpPageSession {
    async fn navigate(&self, url: &str) -> Result<String, ScoutError> {
        self.client
            .get_text(url)
            .await
            .map_err(|e| ScoutError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
        <html><head><title>Mouse Gamer | Tienda Example</title></head>
        <body>
          <h1 class="product_title">Mouse Gamer RGB</h1>
          <p class="price"><span class="symbol">S/</span><span class="value">89.90</span></p>
          <img id="main" src="/img/mouse.jpg">
          <table class="specs">
            <tr><th>Marca</th><td>Logitech</td></tr>
            <tr><th>Color</th><td>Negro</td></tr>
            <tr><td>solo una celda</td></tr>
          </table>
        </body></html>"#;

    #[test]
    fn select_text_normalizes_whitespace() {
        let page = HtmlPage::parse("https://t.example/p", DOC);
        assert_eq!(page.select_text("p.price").as_deref(), Some("S/ 89.90"));
    }

    #[test]
    fn fallback_chains_use_first_match() {
        let page = HtmlPage::parse("https://t.example/p", DOC);
        assert_eq!(
            page.select_text(".missing, h1.product_title").as_deref(),
            Some("Mouse Gamer RGB")
        );
    }

    #[test]
    fn invalid_selector_behaves_as_no_match() {
        let page = HtmlPage::parse("https://t.example/p", DOC);
        assert_eq!(page.select_text("p..[broken"), None);
        assert!(!page.exists("p..[broken"));
    }

    #[test]
    fn attributes_and_pairs() {
        let page = HtmlPage::parse("https://t.example/p", DOC);
        assert_eq!(page.select_attr("img#main", "src").as_deref(), Some("/img/mouse.jpg"));
        let pairs = page.select_pairs("table.specs tr");
        assert_eq!(
            pairs,
            vec![
                ("Marca".to_string(), "Logitech".to_string()),
                ("Color".to_string(), "Negro".to_string()),
            ]
        );
    }
}
