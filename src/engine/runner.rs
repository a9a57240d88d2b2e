//! Run orchestration
//!
//! Wires discovery, scheduling, extraction and persistence into one run:
//! resolve every configured sitemap, group surviving URLs by domain,
//! push one domain session per batch through the admission queue, then
//! persist records, price history, categories, scrape logs and the JSON
//! run outputs. A run always completes; no single failure is fatal.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::product::{
    ExtractionTask, ProductRecord, RecordOutcome, SitemapEntry,
};
use crate::domain::taxonomy::CategoryClassifier;
use crate::engine::governor::{ConcurrencyGovernor, ResourceProbe};
use crate::engine::queue::TaskQueue;
use crate::engine::session::{DomainOutcome, DomainSession};
use crate::error::ScoutError;
use crate::extraction::classifier::ProductClassifier;
use crate::extraction::fields::FieldExtractor;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};
use crate::infrastructure::output;
use crate::infrastructure::page::FetchEngine;
use crate::infrastructure::sitemap::SitemapResolver;
use crate::infrastructure::store::ProductStore;

/// Aggregated counters for one run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    pub domains: u32,
    pub processed: u32,
    pub extracted: u32,
    pub non_products: u32,
    pub failed: u32,
    pub store_errors: u32,
    pub price_changes: u32,
}

impl RunSummary {
    fn tally(&mut self, record: &ProductRecord) {
        self.processed += 1;
        match record.outcome {
            RecordOutcome::Extracted => self.extracted += 1,
            RecordOutcome::NonProduct => self.non_products += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }
}

/// Everything a run produced, for callers that want more than counters.
pub struct RunReport {
    pub summary: RunSummary,
    pub records: Vec<ProductRecord>,
}

/// The concurrent extraction engine.
pub struct CrawlEngine {
    config: AppConfig,
    fetch_engine: Arc<dyn FetchEngine>,
    store: Arc<dyn ProductStore>,
    governor: Arc<ConcurrencyGovernor>,
    queue: Arc<TaskQueue>,
    classifier: Arc<ProductClassifier>,
    extractor: Arc<FieldExtractor>,
}

impl CrawlEngine {
    pub fn new(
        config: AppConfig,
        fetch_engine: Arc<dyn FetchEngine>,
        store: Arc<dyn ProductStore>,
        probe: Box<dyn ResourceProbe>,
    ) -> Self {
        let governor = Arc::new(ConcurrencyGovernor::new(config.governor.clone(), probe));
        let queue = Arc::new(TaskQueue::new(Arc::clone(&governor)));
        Self {
            config,
            fetch_engine,
            store,
            governor,
            queue,
            classifier: Arc::new(ProductClassifier::default()),
            extractor: Arc::new(FieldExtractor::with_builtin()),
        }
    }

    pub fn governor(&self) -> &Arc<ConcurrencyGovernor> {
        &self.governor
    }

    /// Full run: sitemap discovery followed by extraction and
    /// persistence.
    pub async fn run(&self) -> Result<RunReport, ScoutError> {
        let entries = self.discover().await?;
        self.run_with_entries(entries).await
    }

    /// Resolve every configured sitemap. A failing sitemap contributes
    /// zero entries.
    pub async fn discover(&self) -> Result<Vec<SitemapEntry>, ScoutError> {
        let http = HttpClient::new(HttpClientConfig {
            user_agent: self.config.crawler.user_agent.clone(),
            timeout_seconds: self.config.crawler.navigation_timeout_secs,
            max_requests_per_second: self.config.crawler.max_requests_per_second,
            follow_redirects: true,
        })
        .map_err(|e| ScoutError::Config(e.to_string()))?;
        let resolver = SitemapResolver::new(http);

        let mut entries = Vec::new();
        for site in &self.config.sites {
            let source = site.sitemap_source();
            entries.extend(resolver.resolve(&source).await);
        }
        info!(urls = entries.len(), sites = self.config.sites.len(), "discovery finished");
        Ok(entries)
    }

    /// Run extraction and persistence over already-discovered entries.
    pub async fn run_with_entries(
        &self,
        entries: Vec<SitemapEntry>,
    ) -> Result<RunReport, ScoutError> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4();
        let batches = group_by_domain(entries);
        info!(%run_id, domains = batches.len(), "run started");
        let mut summary = RunSummary {
            domains: batches.len() as u32,
            ..Default::default()
        };

        let mut handles = Vec::new();
        for (domain, tasks) in batches {
            let queue = Arc::clone(&self.queue);
            let session = DomainSession::new(
                domain,
                Arc::clone(&self.fetch_engine),
                Arc::clone(&self.classifier),
                Arc::clone(&self.extractor),
                Arc::clone(&self.governor),
                self.config.crawler.clone(),
            );
            handles.push(tokio::spawn(async move {
                let _slot = queue.acquire().await;
                session.run(tasks).await
            }));
        }

        let outcomes: Vec<DomainOutcome> = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    warn!(error = %err, "domain task aborted");
                    None
                }
            })
            .collect();

        let mut all_records = Vec::new();
        let mut seen = HashSet::new();
        for outcome in outcomes {
            if let Err(err) = self.store.append_scrape_log(&outcome.log).await {
                warn!(domain = %outcome.domain, error = %err, "scrape log not persisted");
                summary.store_errors += 1;
            }
            for record in outcome.records {
                summary.tally(&record);
                let first_sighting = seen.insert(record.fingerprint());
                if !first_sighting {
                    debug!(url = %record.link, "duplicate record skipped");
                } else if record.outcome == RecordOutcome::Extracted {
                    match self.persist_record(&record).await {
                        Ok(price_changed) => {
                            if price_changed {
                                summary.price_changes += 1;
                            }
                        }
                        Err(err) => {
                            warn!(url = %record.link, error = %err, "record not persisted");
                            summary.store_errors += 1;
                        }
                    }
                }
                all_records.push(record);
            }
        }

        if let Err(err) = output::write_run_outputs(
            &all_records,
            &self.config.storage.output_dir,
            started_at,
        )
        .await
        {
            warn!(error = %err, "run outputs not written");
        }

        info!(
            domains = summary.domains,
            processed = summary.processed,
            extracted = summary.extracted,
            non_products = summary.non_products,
            failed = summary.failed,
            price_changes = summary.price_changes,
            "run finished"
        );
        Ok(RunReport {
            summary,
            records: all_records,
        })
    }

    /// Upsert one record, append price history when the price changed,
    /// and assign taxonomy categories. Returns whether a history row was
    /// written.
    async fn persist_record(&self, record: &ProductRecord) -> Result<bool, ScoutError> {
        let existing = self.store.find_by_key(&record.site_id, &record.link).await?;
        let id = self.store.upsert(record).await?;

        let mut price_changed = false;
        if let Some(price) = record.price {
            let differs = match existing.and_then(|stored| stored.current_price) {
                Some(previous) => (previous - price).abs() > f64::EPSILON,
                None => true,
            };
            if differs {
                self.store.append_price_history(id, price).await?;
                price_changed = true;
            }
        }

        let slugs: Vec<String> = CategoryClassifier::classify(record)
            .into_iter()
            .map(|assignment| assignment.slug)
            .collect();
        self.store.assign_categories(id, &slugs).await?;
        Ok(price_changed)
    }
}

/// Group entries by URL host, preserving input order within each domain.
fn group_by_domain(entries: Vec<SitemapEntry>) -> BTreeMap<String, Vec<ExtractionTask>> {
    let mut batches: BTreeMap<String, Vec<ExtractionTask>> = BTreeMap::new();
    for entry in entries {
        let Some(host) = Url::parse(&entry.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            warn!(url = %entry.url, "entry with unusable host skipped");
            continue;
        };
        batches
            .entry(host)
            .or_default()
            .push(ExtractionTask::from_entry(&entry));
    }
    batches
}
