//! Per-domain extraction session
//!
//! One fetch session per domain, processing that domain's URLs strictly
//! in input order with a politeness delay between requests and bounded
//! retry/backoff per URL. Classification failure is a content verdict
//! and is never retried; navigation and evaluation failures are.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::domain::product::{
    ExtractionTask, ProductRecord, ScrapeLogEntry, ScrapeStatus,
};
use crate::domain::url_rules;
use crate::engine::governor::ConcurrencyGovernor;
use crate::error::ScoutError;
use crate::extraction::classifier::ProductClassifier;
use crate::extraction::fields::FieldExtractor;
use crate::infrastructure::config::CrawlerConfig;
use crate::infrastructure::page::{FetchEngine, HtmlPage, PageSession};

/// Everything one domain's batch produced: exactly one record per task
/// plus the scrape-log entry.
pub struct DomainOutcome {
    pub domain: String,
    pub records: Vec<ProductRecord>,
    pub log: ScrapeLogEntry,
}

/// Processes one domain's URL batch over a dedicated fetch session.
pub struct DomainSession {
    domain: String,
    engine: Arc<dyn FetchEngine>,
    classifier: Arc<ProductClassifier>,
    extractor: Arc<FieldExtractor>,
    governor: Arc<ConcurrencyGovernor>,
    config: CrawlerConfig,
}

impl DomainSession {
    pub fn new(
        domain: impl Into<String>,
        engine: Arc<dyn FetchEngine>,
        classifier: Arc<ProductClassifier>,
        extractor: Arc<FieldExtractor>,
        governor: Arc<ConcurrencyGovernor>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            domain: domain.into(),
            engine,
            classifier,
            extractor,
            governor,
            config,
        }
    }

    /// Run the batch. The session is closed when the batch ends,
    /// regardless of individual outcomes.
    pub async fn run(&self, tasks: Vec<ExtractionTask>) -> DomainOutcome {
        let started_at = Utc::now();
        info!(domain = %self.domain, urls = tasks.len(), "domain batch started");

        let session = match self.engine.open_session(&self.domain).await {
            Ok(session) => session,
            Err(err) => {
                warn!(domain = %self.domain, error = %err, "session open failed, batch aborted");
                return self.failed_batch(&tasks, &err);
            }
        };

        let mut records = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.iter().enumerate() {
            if index > 0 {
                sleep(Duration::from_millis(self.config.request_delay_ms)).await;
            }

            let record = if url_rules::is_denied(&task.url) {
                debug!(url = %task.url, "deny-listed url short-circuited");
                ProductRecord::non_product(task, "url matches the non-product deny-list")
            } else {
                self.process_url(session.as_ref(), task).await
            };

            if record.is_error() {
                self.governor.record_error();
            } else {
                self.governor.record_success();
            }
            records.push(record);
        }
        drop(session);

        let log = self.build_log(&records, started_at, ScrapeStatus::Completed);
        info!(
            domain = %self.domain,
            processed = log.products_processed,
            errors = log.error_count,
            "domain batch finished"
        );
        DomainOutcome {
            domain: self.domain.clone(),
            records,
            log,
        }
    }

    /// One URL through the retry loop. Every exit path yields exactly
    /// one record.
    async fn process_url(&self, session: &dyn PageSession, task: &ExtractionTask) -> ProductRecord {
        let mut task = task.clone();
        loop {
            match self.attempt(session, &task).await {
                Ok(record) => return record,
                Err(err) => {
                    task.retry_count += 1;
                    if task.retry_count > self.config.max_retries {
                        warn!(url = %task.url, error = %err, "retries exhausted");
                        return ProductRecord::terminal_error(&task, err.to_string());
                    }
                    let backoff_ms = self.config.retry_backoff_ms * u64::from(task.retry_count)
                        + fastrand::u64(..250);
                    warn!(
                        url = %task.url,
                        retry = task.retry_count,
                        backoff_ms,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        session: &dyn PageSession,
        task: &ExtractionTask,
    ) -> Result<ProductRecord, ScoutError> {
        let html = timeout(
            Duration::from_secs(self.config.navigation_timeout_secs),
            session.navigate(&task.url),
        )
        .await
        .map_err(|_| ScoutError::Navigation {
            url: task.url.clone(),
            reason: format!(
                "navigation timed out after {}s",
                self.config.navigation_timeout_secs
            ),
        })??;

        // Settle period for late-loading content.
        if self.config.settle_delay_ms > 0 {
            sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        }

        let page = HtmlPage::parse(&task.url, html);
        let verdict = self.classifier.classify(&page, task.platform);
        if !verdict.is_product {
            debug!(url = %task.url, score = verdict.score, "classified as non-product");
            return Ok(ProductRecord::non_product(
                task,
                format!("page did not classify as a product (score {})", verdict.score),
            ));
        }
        Ok(self.extractor.extract(&page, task))
    }

    /// Session construction failed: every URL in the batch becomes a
    /// terminal error and the scrape log is marked failed.
    fn failed_batch(&self, tasks: &[ExtractionTask], err: &ScoutError) -> DomainOutcome {
        let records: Vec<ProductRecord> = tasks
            .iter()
            .map(|task| ProductRecord::terminal_error(task, err.to_string()))
            .collect();
        for _ in &records {
            self.governor.record_error();
        }
        let mut log = self.build_log(&records, Utc::now(), ScrapeStatus::Failed);
        log.error_details = Some(err.to_string());
        DomainOutcome {
            domain: self.domain.clone(),
            records,
            log,
        }
    }

    fn build_log(
        &self,
        records: &[ProductRecord],
        started_at: chrono::DateTime<Utc>,
        status: ScrapeStatus,
    ) -> ScrapeLogEntry {
        let error_count = records.iter().filter(|r| r.is_error()).count() as u32;
        let error_details: Vec<&str> = records
            .iter()
            .filter(|r| r.is_error())
            .filter_map(|r| r.error.as_deref())
            .take(5)
            .collect();
        let site_id = records
            .first()
            .map(|r| r.site_id.clone())
            .unwrap_or_else(|| self.domain.clone());
        ScrapeLogEntry {
            site_id,
            status,
            products_processed: records.len() as u32,
            error_count,
            error_details: (!error_details.is_empty()).then(|| error_details.join("; ")),
            started_at,
            finished_at: Utc::now(),
        }
    }
}
