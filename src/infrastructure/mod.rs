//! Infrastructure module - external concerns
//!
//! HTTP fetching, sitemap parsing, page access, persistence, run outputs,
//! configuration and logging.

pub mod config;
pub mod http_client;
pub mod logging;
pub mod output;
pub mod page;
pub mod sitemap;
pub mod store;

pub use config::AppConfig;
pub use page::{FetchEngine, HtmlPage, PageInspector, PageSession};
pub use store::{ProductStore, SqliteProductStore, StoredProduct};
