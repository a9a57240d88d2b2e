//! Sitemap fetching and parsing
//!
//! Resolves a site's sitemap descriptor into candidate product URLs.
//! Three strategies: sitemap indexes (follow product sub-sitemaps),
//! direct url-sets (deny-list filtering), and Mercado Shops url-sets
//! (deny-list plus a positive product-slug heuristic). A failed sitemap
//! never aborts the run; it just contributes zero URLs.

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::domain::product::{Platform, SitemapEntry, SitemapKind, SitemapSource};
use crate::domain::url_rules;
use crate::error::ScoutError;
use crate::infrastructure::http_client::HttpClient;

/// Nested sitemap indexes are followed this deep at most.
const MAX_INDEX_DEPTH: usize = 3;

#[derive(Debug, PartialEq)]
struct RawEntry {
    loc: String,
    lastmod: Option<String>,
}

#[derive(Debug, PartialEq)]
enum SitemapDoc {
    UrlSet(Vec<RawEntry>),
    Index(Vec<RawEntry>),
}

fn parse_sitemap_xml(url: &str, xml: &str) -> Result<SitemapDoc, ScoutError> {
    let mut reader = Reader::from_str(xml);
    let mut is_index = false;
    let mut in_loc = false;
    let mut in_lastmod = false;
    let mut current_loc: Option<String> = None;
    let mut current_lastmod: Option<String> = None;
    let mut entries = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"loc" => in_loc = true,
                b"lastmod" => in_lastmod = true,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ScoutError::SitemapParse {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?
                    .trim()
                    .to_string();
                if in_loc && !text.is_empty() {
                    current_loc = Some(text);
                } else if in_lastmod && !text.is_empty() {
                    current_lastmod = Some(text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"loc" => in_loc = false,
                b"lastmod" => in_lastmod = false,
                b"url" | b"sitemap" => {
                    if let Some(loc) = current_loc.take() {
                        entries.push(RawEntry {
                            loc,
                            lastmod: current_lastmod.take(),
                        });
                    }
                    current_lastmod = None;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ScoutError::SitemapParse {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    if entries.is_empty() && !xml.contains("<urlset") && !is_index {
        return Err(ScoutError::SitemapParse {
            url: url.to_string(),
            reason: "document is neither a urlset nor a sitemap index".to_string(),
        });
    }

    Ok(if is_index {
        SitemapDoc::Index(entries)
    } else {
        SitemapDoc::UrlSet(entries)
    })
}

/// Sitemaps publish `lastmod` as either full W3C datetimes or bare dates.
fn parse_lastmod(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn keep_url(url: &str, platform: Platform) -> bool {
    if url_rules::is_denied(url) {
        return false;
    }
    match platform {
        Platform::Woocommerce => true,
        Platform::Mercadoshops => url_rules::looks_like_product_path(url),
    }
}

fn entries_from(raw: Vec<RawEntry>, source: &SitemapSource) -> Vec<SitemapEntry> {
    raw.into_iter()
        .filter(|entry| keep_url(&entry.loc, source.platform))
        .map(|entry| SitemapEntry {
            url: entry.loc,
            site_id: source.site_id.clone(),
            platform: source.platform,
            last_modified: entry.lastmod.as_deref().and_then(parse_lastmod),
        })
        .collect()
}

/// Fetches and parses sitemaps into candidate URL entries.
pub struct SitemapResolver {
    http: HttpClient,
}

impl SitemapResolver {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Resolve one sitemap descriptor into URL entries. Infallible by
    /// design: failures are logged and yield an empty list.
    pub async fn resolve(&self, source: &SitemapSource) -> Vec<SitemapEntry> {
        match self.try_resolve(source).await {
            Ok(entries) => {
                debug!(
                    site = %source.site_id,
                    count = entries.len(),
                    "sitemap resolved"
                );
                entries
            }
            Err(err) => {
                warn!(site = %source.site_id, error = %err, "sitemap skipped");
                Vec::new()
            }
        }
    }

    async fn try_resolve(&self, source: &SitemapSource) -> Result<Vec<SitemapEntry>, ScoutError> {
        let doc = self.fetch_doc(&source.url).await?;
        match (source.kind, doc) {
            (_, SitemapDoc::UrlSet(raw)) => Ok(entries_from(raw, source)),
            (SitemapKind::Direct, SitemapDoc::Index(_)) => Err(ScoutError::SitemapParse {
                url: source.url.clone(),
                reason: "expected a urlset but found a sitemap index".to_string(),
            }),
            (SitemapKind::Index, SitemapDoc::Index(children)) => {
                Ok(self.resolve_index(children, source).await)
            }
        }
    }

    /// Walk a sitemap index, following only sub-sitemaps whose path
    /// mentions products. A failing sub-sitemap contributes nothing.
    async fn resolve_index(
        &self,
        children: Vec<RawEntry>,
        source: &SitemapSource,
    ) -> Vec<SitemapEntry> {
        let mut collected = Vec::new();
        let mut pending: Vec<(String, usize)> = children
            .into_iter()
            .filter(|child| child.loc.to_lowercase().contains("product"))
            .map(|child| (child.loc, 1))
            .collect();

        while let Some((sub_url, depth)) = pending.pop() {
            if depth >= MAX_INDEX_DEPTH {
                warn!(url = %sub_url, "sitemap index nesting too deep, skipping");
                continue;
            }
            match self.fetch_doc(&sub_url).await {
                Ok(SitemapDoc::UrlSet(raw)) => collected.extend(entries_from(raw, source)),
                Ok(SitemapDoc::Index(nested)) => pending.extend(
                    nested
                        .into_iter()
                        .filter(|child| child.loc.to_lowercase().contains("product"))
                        .map(|child| (child.loc, depth + 1)),
                ),
                Err(err) => warn!(url = %sub_url, error = %err, "sub-sitemap skipped"),
            }
        }
        collected
    }

    async fn fetch_doc(&self, url: &str) -> Result<SitemapDoc, ScoutError> {
        let body = self
            .http
            .get_text(url)
            .await
            .map_err(|e| ScoutError::SitemapFetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        parse_sitemap_xml(url, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url>
            <loc>https://tienda.example.pe/producto/mouse-gamer</loc>
            <lastmod>2025-11-02</lastmod>
          </url>
          <url><loc>https://tienda.example.pe/carrito</loc></url>
          <url><loc>https://tienda.example.pe/producto/teclado-tkl</loc></url>
        </urlset>"#;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap>
            <loc>https://tienda.example.pe/wp-sitemap-posts-product-1.xml</loc>
            <lastmod>2025-11-02T08:30:00+00:00</lastmod>
          </sitemap>
          <sitemap><loc>https://tienda.example.pe/wp-sitemap-posts-page-1.xml</loc></sitemap>
        </sitemapindex>"#;

    fn source(platform: Platform) -> SitemapSource {
        SitemapSource {
            url: "https://tienda.example.pe/sitemap.xml".to_string(),
            site_id: "tienda-example".to_string(),
            platform,
            kind: SitemapKind::Direct,
        }
    }

    #[test]
    fn urlset_parses_locs_and_lastmod() {
        let doc = parse_sitemap_xml("test", URLSET).unwrap();
        let SitemapDoc::UrlSet(raw) = doc else {
            panic!("expected urlset");
        };
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0].lastmod.as_deref(), Some("2025-11-02"));
        assert_eq!(raw[1].lastmod, None);
    }

    #[test]
    fn index_is_detected() {
        let doc = parse_sitemap_xml("test", INDEX).unwrap();
        let SitemapDoc::Index(children) = doc else {
            panic!("expected index");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_sitemap_xml("test", "<html>not a sitemap</html>").is_err());
        assert!(parse_sitemap_xml("test", "<<<<").is_err());
    }

    #[test]
    fn direct_strategy_applies_deny_list() {
        let SitemapDoc::UrlSet(raw) = parse_sitemap_xml("test", URLSET).unwrap() else {
            panic!("expected urlset");
        };
        let entries = entries_from(raw, &source(Platform::Woocommerce));
        let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://tienda.example.pe/producto/mouse-gamer",
                "https://tienda.example.pe/producto/teclado-tkl",
            ]
        );
        assert!(entries[0].last_modified.is_some());
    }

    #[test]
    fn marketplace_strategy_also_requires_product_slug() {
        let raw = vec![
            RawEntry {
                loc: "https://shop.example.pe/ofertas".to_string(),
                lastmod: None,
            },
            RawEntry {
                loc: "https://shop.example.pe/MPE-628843770-ssd-1tb-_JM".to_string(),
                lastmod: None,
            },
        ];
        let entries = entries_from(raw, &source(Platform::Mercadoshops));
        assert_eq!(entries.len(), 1);
        assert!(entries[0].url.contains("MPE-628843770"));
    }

    #[test]
    fn lastmod_accepts_dates_and_datetimes() {
        assert!(parse_lastmod("2025-11-02").is_some());
        assert!(parse_lastmod("2025-11-02T08:30:00+00:00").is_some());
        assert!(parse_lastmod("last tuesday").is_none());
    }
}
