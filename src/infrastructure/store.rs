//! Product persistence
//!
//! The `ProductStore` trait is the engine's only view of the database:
//! keyed lookup, upsert, append-only price history, category assignment
//! and scrape logs. Product uniqueness is enforced on `(site_id, url)`.
//! Price-history rows are written by the caller only when the observed
//! price differs from the stored one.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::domain::product::{ProductRecord, ScrapeLogEntry};
use crate::error::ScoutError;

/// Stored identity and last observed price of a product.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProduct {
    pub id: i64,
    pub current_price: Option<f64>,
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_key(
        &self,
        site_id: &str,
        url: &str,
    ) -> Result<Option<StoredProduct>, ScoutError>;

    /// Insert or update a product row, returning its id.
    async fn upsert(&self, record: &ProductRecord) -> Result<i64, ScoutError>;

    async fn append_price_history(&self, product_id: i64, price: f64) -> Result<(), ScoutError>;

    async fn assign_categories(
        &self,
        product_id: i64,
        slugs: &[String],
    ) -> Result<(), ScoutError>;

    async fn append_scrape_log(&self, entry: &ScrapeLogEntry) -> Result<(), ScoutError>;
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    pub async fn connect(database_url: &str) -> Result<Self, ScoutError> {
        // In-memory databases exist per connection; a larger pool would
        // hand out empty databases.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), ScoutError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id TEXT NOT NULL,
                url TEXT NOT NULL,
                name TEXT NOT NULL,
                raw_price TEXT NOT NULL,
                price REAL,
                stock TEXT NOT NULL,
                quantity INTEGER,
                image_url TEXT NOT NULL DEFAULT '',
                platform TEXT NOT NULL,
                sku TEXT,
                brand TEXT,
                presentation TEXT,
                description TEXT NOT NULL DEFAULT '',
                specifications TEXT NOT NULL DEFAULT '{}',
                scraped_at TEXT NOT NULL,
                UNIQUE(site_id, url)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS product_categories (
                product_id INTEGER NOT NULL REFERENCES products(id),
                category_id INTEGER NOT NULL REFERENCES categories(id),
                UNIQUE(product_id, category_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL REFERENCES products(id),
                price REAL NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS scraping_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id TEXT NOT NULL,
                status TEXT NOT NULL,
                products_processed INTEGER NOT NULL,
                error_count INTEGER NOT NULL,
                error_details TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL
            )
            "#,
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn find_by_key(
        &self,
        site_id: &str,
        url: &str,
    ) -> Result<Option<StoredProduct>, ScoutError> {
        let row = sqlx::query("SELECT id, price FROM products WHERE site_id = ? AND url = ?")
            .bind(site_id)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| StoredProduct {
            id: row.get("id"),
            current_price: row.get("price"),
        }))
    }

    async fn upsert(&self, record: &ProductRecord) -> Result<i64, ScoutError> {
        let specifications =
            serde_json::to_string(&record.specifications).unwrap_or_else(|_| "{}".to_string());
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products
                (site_id, url, name, raw_price, price, stock, quantity, image_url,
                 platform, sku, brand, presentation, description, specifications, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(site_id, url) DO UPDATE SET
                name = excluded.name,
                raw_price = excluded.raw_price,
                price = excluded.price,
                stock = excluded.stock,
                quantity = excluded.quantity,
                image_url = excluded.image_url,
                sku = excluded.sku,
                brand = excluded.brand,
                presentation = excluded.presentation,
                description = excluded.description,
                specifications = excluded.specifications,
                scraped_at = excluded.scraped_at
            RETURNING id
            "#,
        )
        .bind(&record.site_id)
        .bind(&record.link)
        .bind(&record.name)
        .bind(&record.raw_price)
        .bind(record.price)
        .bind(record.stock.as_str())
        .bind(record.quantity)
        .bind(&record.image_url)
        .bind(record.platform.as_str())
        .bind(&record.sku)
        .bind(&record.brand)
        .bind(&record.presentation)
        .bind(&record.description)
        .bind(specifications)
        .bind(record.scraped_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn append_price_history(&self, product_id: i64, price: f64) -> Result<(), ScoutError> {
        sqlx::query("INSERT INTO price_history (product_id, price) VALUES (?, ?)")
            .bind(product_id)
            .bind(price)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn assign_categories(
        &self,
        product_id: i64,
        slugs: &[String],
    ) -> Result<(), ScoutError> {
        for slug in slugs {
            let category_id: i64 = sqlx::query_scalar(
                "INSERT INTO categories (slug) VALUES (?)
                 ON CONFLICT(slug) DO UPDATE SET slug = excluded.slug
                 RETURNING id",
            )
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO product_categories (product_id, category_id) VALUES (?, ?)",
            )
            .bind(product_id)
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn append_scrape_log(&self, entry: &ScrapeLogEntry) -> Result<(), ScoutError> {
        sqlx::query(
            r#"
            INSERT INTO scraping_logs
                (site_id, status, products_processed, error_count, error_details,
                 started_at, finished_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.site_id)
        .bind(match entry.status {
            crate::domain::product::ScrapeStatus::Completed => "completed",
            crate::domain::product::ScrapeStatus::Failed => "failed",
        })
        .bind(entry.products_processed)
        .bind(entry.error_count)
        .bind(&entry.error_details)
        .bind(entry.started_at.to_rfc3339())
        .bind(entry.finished_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        info!(site = %entry.site_id, status = ?entry.status, "scrape log appended");
        Ok(())
    }
}

/// In-memory store used by tests and dry runs.
#[derive(Default)]
pub struct MemoryProductStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    products: HashMap<(String, String), (i64, ProductRecord)>,
    price_history: Vec<(i64, f64)>,
    categories: HashMap<i64, Vec<String>>,
    scrape_logs: Vec<ScrapeLogEntry>,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price_history_len(&self, product_id: i64) -> usize {
        self.state
            .lock()
            .expect("memory store poisoned")
            .price_history
            .iter()
            .filter(|(id, _)| *id == product_id)
            .count()
    }

    pub fn product_count(&self) -> usize {
        self.state.lock().expect("memory store poisoned").products.len()
    }

    pub fn scrape_logs(&self) -> Vec<ScrapeLogEntry> {
        self.state
            .lock()
            .expect("memory store poisoned")
            .scrape_logs
            .clone()
    }

    pub fn categories_for(&self, product_id: i64) -> Vec<String> {
        self.state
            .lock()
            .expect("memory store poisoned")
            .categories
            .get(&product_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn find_by_key(
        &self,
        site_id: &str,
        url: &str,
    ) -> Result<Option<StoredProduct>, ScoutError> {
        let state = self.state.lock().expect("memory store poisoned");
        Ok(state
            .products
            .get(&(site_id.to_string(), url.to_string()))
            .map(|(id, record)| StoredProduct {
                id: *id,
                current_price: record.price,
            }))
    }

    async fn upsert(&self, record: &ProductRecord) -> Result<i64, ScoutError> {
        let mut state = self.state.lock().expect("memory store poisoned");
        let key = (record.site_id.clone(), record.link.clone());
        if let Some((id, existing)) = state.products.get_mut(&key) {
            let id = *id;
            *existing = record.clone();
            Ok(id)
        } else {
            state.next_id += 1;
            let id = state.next_id;
            state.products.insert(key, (id, record.clone()));
            Ok(id)
        }
    }

    async fn append_price_history(&self, product_id: i64, price: f64) -> Result<(), ScoutError> {
        self.state
            .lock()
            .expect("memory store poisoned")
            .price_history
            .push((product_id, price));
        Ok(())
    }

    async fn assign_categories(
        &self,
        product_id: i64,
        slugs: &[String],
    ) -> Result<(), ScoutError> {
        self.state
            .lock()
            .expect("memory store poisoned")
            .categories
            .insert(product_id, slugs.to_vec());
        Ok(())
    }

    async fn append_scrape_log(&self, entry: &ScrapeLogEntry) -> Result<(), ScoutError> {
        self.state
            .lock()
            .expect("memory store poisoned")
            .scrape_logs
            .push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{ExtractionTask, Platform};

    fn record(url: &str, price: Option<f64>) -> ProductRecord {
        let task = ExtractionTask {
            url: url.to_string(),
            site_id: "tienda-example".to_string(),
            platform: Platform::Woocommerce,
            retry_count: 0,
        };
        let mut record = ProductRecord::empty(&task);
        record.name = "Teclado TKL".to_string();
        record.raw_price = "S/ 199.00".to_string();
        record.price = price;
        record
    }

    #[tokio::test]
    async fn sqlite_upsert_is_idempotent_on_identity() {
        let store = SqliteProductStore::connect("sqlite::memory:").await.unwrap();
        let first = store.upsert(&record("https://t/p1", Some(199.0))).await.unwrap();
        let second = store.upsert(&record("https://t/p1", Some(149.0))).await.unwrap();
        assert_eq!(first, second);

        let stored = store
            .find_by_key("tienda-example", "https://t/p1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, first);
        assert_eq!(stored.current_price, Some(149.0));
    }

    #[tokio::test]
    async fn sqlite_categories_and_history_append() {
        let store = SqliteProductStore::connect("sqlite::memory:").await.unwrap();
        let id = store.upsert(&record("https://t/p2", Some(99.0))).await.unwrap();
        store.append_price_history(id, 99.0).await.unwrap();
        store
            .assign_categories(id, &["perifericos".to_string(), "teclados".to_string()])
            .await
            .unwrap();
        // Re-assignment of the same slugs must not fail.
        store
            .assign_categories(id, &["perifericos".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn memory_store_tracks_history_per_product() {
        let store = MemoryProductStore::new();
        let id = store.upsert(&record("https://t/p3", Some(50.0))).await.unwrap();
        store.append_price_history(id, 50.0).await.unwrap();
        store.append_price_history(id, 45.0).await.unwrap();
        assert_eq!(store.price_history_len(id), 2);
        assert_eq!(store.product_count(), 1);
    }
}
