//! End-to-end pipeline tests over scripted fixture pages and the
//! in-memory store.

use std::sync::Arc;

use tienda_scout::domain::product::{
    Platform, RecordOutcome, ScrapeStatus, SitemapEntry, StockStatus,
};
use tienda_scout::engine::governor::{ResourcePressure, ResourceProbe};
use tienda_scout::engine::CrawlEngine;
use tienda_scout::infrastructure::config::AppConfig;
use tienda_scout::infrastructure::store::{MemoryProductStore, ProductStore};
use tienda_scout::testing::FixtureEngine;

struct CalmProbe;

impl ResourceProbe for CalmProbe {
    fn snapshot(&self) -> ResourcePressure {
        ResourcePressure::default()
    }
}

fn product_page(name: &str, price: &str) -> String {
    format!(
        r#"<html><head><title>{name} | Tienda Example</title>
        <meta property="og:type" content="product"></head>
        <body class="single-product">
          <h1 class="product_title">{name}</h1>
          <p class="price"><span class="woocommerce-Price-amount">{price}</span></p>
          <p class="stock in-stock">En stock</p>
          <form class="cart" action="/carrito" method="post">
            <button type="submit" class="single_add_to_cart_button">Añadir al carrito</button>
          </form>
        </body></html>"#
    )
}

const NON_PRODUCT_PAGE: &str =
    "<html><head><title>Nosotros</title></head><body><h2>Quiénes somos</h2></body></html>";

fn entry(url: &str) -> SitemapEntry {
    SitemapEntry {
        url: url.to_string(),
        site_id: "tienda-example".to_string(),
        platform: Platform::Woocommerce,
        last_modified: None,
    }
}

fn test_config(output_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.crawler.request_delay_ms = 1;
    config.crawler.settle_delay_ms = 0;
    config.crawler.retry_backoff_ms = 1;
    config.crawler.navigation_timeout_secs = 5;
    config.storage.output_dir = output_dir.to_path_buf();
    config
}

fn engine_with(
    fixtures: FixtureEngine,
    store: Arc<MemoryProductStore>,
    output_dir: &std::path::Path,
) -> CrawlEngine {
    CrawlEngine::new(
        test_config(output_dir),
        Arc::new(fixtures),
        store,
        Box::new(CalmProbe),
    )
}

#[tokio::test]
async fn batch_with_denied_middle_url_yields_three_records() {
    let fixtures = FixtureEngine::new();
    fixtures.set_page(
        "https://tienda.example.pe/producto/teclado-tkl",
        product_page("Teclado TKL", "S/ 199.00"),
    );
    fixtures.set_page(
        "https://tienda.example.pe/producto/mouse-gamer",
        product_page("Mouse Gamer", "S/ 89.90"),
    );
    let store = Arc::new(MemoryProductStore::new());
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());

    let report = engine
        .run_with_entries(vec![
            entry("https://tienda.example.pe/producto/teclado-tkl"),
            entry("https://tienda.example.pe/carrito"),
            entry("https://tienda.example.pe/producto/mouse-gamer"),
        ])
        .await
        .unwrap();

    assert_eq!(report.records.len(), 3);
    assert_eq!(report.records[0].outcome, RecordOutcome::Extracted);
    assert_eq!(report.records[1].outcome, RecordOutcome::NonProduct);
    assert!(report.records[1].error.is_some());
    assert_eq!(report.records[2].outcome, RecordOutcome::Extracted);

    assert_eq!(report.summary.extracted, 2);
    assert_eq!(report.summary.non_products, 1);
    assert_eq!(report.summary.failed, 0);

    // Only real products reach the store; the denied URL was never
    // navigated.
    assert_eq!(store.product_count(), 2);
    let logs = store.scrape_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, ScrapeStatus::Completed);
    assert_eq!(logs[0].products_processed, 3);
    assert_eq!(logs[0].error_count, 0);
}

#[tokio::test]
async fn non_product_page_produces_informational_record() {
    let fixtures = FixtureEngine::new();
    fixtures.set_page("https://tienda.example.pe/novedades-generales", NON_PRODUCT_PAGE);
    let store = Arc::new(MemoryProductStore::new());
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());

    let report = engine
        .run_with_entries(vec![entry("https://tienda.example.pe/novedades-generales")])
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert_eq!(record.outcome, RecordOutcome::NonProduct);
    assert!(record.error.as_deref().unwrap().contains("score"));
    assert_eq!(store.product_count(), 0);
    // A content verdict is terminal: exactly one navigation, no retries.
    assert_eq!(report.summary.failed, 0);
}

#[tokio::test]
async fn transient_navigation_failures_are_retried() {
    let fixtures = FixtureEngine::new();
    fixtures.set_sequence(
        "https://tienda.example.pe/producto/ssd-1tb",
        vec![
            Err("connection reset".to_string()),
            Err("connection reset".to_string()),
            Ok(product_page("SSD 1TB", "S/ 349.00")),
        ],
    );
    let store = Arc::new(MemoryProductStore::new());
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());

    let report = engine
        .run_with_entries(vec![entry("https://tienda.example.pe/producto/ssd-1tb")])
        .await
        .unwrap();

    let record = &report.records[0];
    assert_eq!(record.outcome, RecordOutcome::Extracted);
    assert_eq!(record.name, "SSD 1TB");
    assert_eq!(record.price, Some(349.0));
    assert_eq!(record.stock, StockStatus::InStock);
}

#[tokio::test]
async fn exhausted_retries_become_a_terminal_error_record() {
    let fixtures = FixtureEngine::new();
    fixtures.set_failure(
        "https://tienda.example.pe/producto/fantasma",
        "HTTP 503 for upstream",
    );
    let store = Arc::new(MemoryProductStore::new());
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());

    let report = engine
        .run_with_entries(vec![entry("https://tienda.example.pe/producto/fantasma")])
        .await
        .unwrap();

    let record = &report.records[0];
    assert_eq!(record.outcome, RecordOutcome::Failed);
    assert!(record.error.as_deref().unwrap().contains("503"));
    assert_eq!(report.summary.failed, 1);
    assert_eq!(store.product_count(), 0);

    let logs = store.scrape_logs();
    assert_eq!(logs[0].error_count, 1);
    // 1 first attempt + 3 retries.
    assert_eq!(logs[0].products_processed, 1);
}

#[tokio::test]
async fn failed_session_fails_only_that_domain() {
    let fixtures = FixtureEngine::new();
    fixtures.fail_domain("caida.example.pe");
    fixtures.set_page(
        "https://sana.example.pe/producto/mouse-gamer",
        product_page("Mouse Gamer", "S/ 89.90"),
    );
    let store = Arc::new(MemoryProductStore::new());
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());

    let report = engine
        .run_with_entries(vec![
            SitemapEntry {
                url: "https://caida.example.pe/producto/algo".to_string(),
                site_id: "tienda-caida".to_string(),
                platform: Platform::Woocommerce,
                last_modified: None,
            },
            SitemapEntry {
                url: "https://sana.example.pe/producto/mouse-gamer".to_string(),
                site_id: "tienda-sana".to_string(),
                platform: Platform::Woocommerce,
                last_modified: None,
            },
        ])
        .await
        .unwrap();

    assert_eq!(report.summary.domains, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.extracted, 1);

    let logs = store.scrape_logs();
    assert_eq!(logs.len(), 2);
    let failed = logs
        .iter()
        .find(|l| l.site_id == "tienda-caida")
        .expect("failed domain log");
    assert_eq!(failed.status, ScrapeStatus::Failed);
    assert_eq!(failed.error_count, 1);
    let healthy = logs
        .iter()
        .find(|l| l.site_id == "tienda-sana")
        .expect("healthy domain log");
    assert_eq!(healthy.status, ScrapeStatus::Completed);
}

#[tokio::test]
async fn unchanged_price_appends_no_history_and_changed_price_appends_one() {
    let url = "https://tienda.example.pe/producto/monitor-27";
    let store = Arc::new(MemoryProductStore::new());
    let dir = tempfile::tempdir().unwrap();

    let fixtures = FixtureEngine::new();
    fixtures.set_page(url, product_page("Monitor 27", "S/ 999.00"));
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());
    engine.run_with_entries(vec![entry(url)]).await.unwrap();

    // First observation opens the history.
    assert_eq!(store.product_count(), 1);
    assert_eq!(store.price_history_len(1), 1);

    // Same price again: still one product row, no new history row.
    engine.run_with_entries(vec![entry(url)]).await.unwrap();
    assert_eq!(store.product_count(), 1);
    assert_eq!(store.price_history_len(1), 1);

    // Price drop: exactly one new history row.
    let fixtures = FixtureEngine::new();
    fixtures.set_page(url, product_page("Monitor 27", "S/ 899.00"));
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());
    let report = engine.run_with_entries(vec![entry(url)]).await.unwrap();
    assert_eq!(store.product_count(), 1);
    assert_eq!(store.price_history_len(1), 2);
    assert_eq!(report.summary.price_changes, 1);
}

#[tokio::test]
async fn run_writes_combined_and_per_site_outputs() {
    let fixtures = FixtureEngine::new();
    fixtures.set_page(
        "https://tienda.example.pe/producto/teclado-tkl",
        product_page("Teclado TKL", "S/ 199.00"),
    );
    let store = Arc::new(MemoryProductStore::new());
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());

    engine
        .run_with_entries(vec![entry("https://tienda.example.pe/producto/teclado-tkl")])
        .await
        .unwrap();

    let mut files: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    files.sort();
    assert_eq!(files.len(), 2);
    assert!(files[0].starts_with("products_"));
    assert!(files[1].starts_with("tienda-example_"));
}

#[tokio::test]
async fn governor_bound_stays_in_range_under_load() {
    let fixtures = FixtureEngine::new();
    let mut entries = Vec::new();
    for d in 0..6 {
        for p in 0..3 {
            let url = format!("https://tienda{d}.example.pe/producto/item-{p}");
            fixtures.set_page(&url, product_page(&format!("Item {p}"), "S/ 10.00"));
            entries.push(SitemapEntry {
                url,
                site_id: format!("tienda-{d}"),
                platform: Platform::Woocommerce,
                last_modified: None,
            });
        }
    }
    let store = Arc::new(MemoryProductStore::new());
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(fixtures, Arc::clone(&store), dir.path());

    let report = engine.run_with_entries(entries).await.unwrap();
    assert_eq!(report.summary.extracted, 18);
    let bound = engine.governor().current_bound();
    assert!((2..=8).contains(&bound), "bound left range: {bound}");
}
