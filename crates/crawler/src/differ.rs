//! Incremental crawl: decide which sitemap entries to re-fetch, fetch them one
//! at a time, persist the result and record restocks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use cellarwatch_core::{is_restock, Sku};
use cellarwatch_infra::store::{CatalogStore, StoreError, UpsertKind};

use crate::fetcher::PageFetcher;
use crate::parser::ProductParser;
use crate::reconcile;
use crate::sitemap::SitemapEntry;

/// Calendar date of a `<lastmod>` value.
///
/// Accepts a bare date (`2026-02-01`) or an RFC 3339 datetime
/// (`2026-02-18T15:21:49+00:00`); the time and offset are ignored.
pub fn parse_lastmod_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Whether an entry must be fetched again.
///
/// Missing or unparseable `lastmod` and unknown SKUs always re-fetch;
/// otherwise only a `lastmod` date strictly after the stored write date does.
pub fn needs_scrape(entry: &SitemapEntry, updated_dates: &HashMap<Sku, NaiveDate>) -> bool {
    let Some(lastmod) = entry.lastmod.as_deref().and_then(parse_lastmod_date) else {
        return true;
    };
    match updated_dates.get(&entry.sku) {
        Some(stored) => lastmod > *stored,
        None => true,
    }
}

/// Exit status for a finished run.
///
/// `0` clean, `1` partial (something saved, something failed), `2` nothing
/// saved and at least one failure.
pub fn exit_code(saved: u64, errors: u64) -> u8 {
    match (saved, errors) {
        (_, 0) => 0,
        (0, _) => 2,
        _ => 1,
    }
}

/// Counters for one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub sitemap_urls: u64,
    pub fetched: u64,
    pub inserted: u64,
    pub updated: u64,
    pub failed: u64,
    pub skipped: u64,
    pub restocks: u64,
    pub delisted: u64,
    pub relisted: u64,
    pub duration: Duration,
}

impl CrawlReport {
    pub fn saved(&self) -> u64 {
        self.inserted + self.updated
    }

    pub fn exit_code(&self) -> u8 {
        exit_code(self.saved(), self.failed)
    }

    /// End-of-run log line, one field per counter.
    pub fn log_summary(&self) {
        info!(
            duration_secs = self.duration.as_secs_f64(),
            sitemap_urls = self.sitemap_urls,
            fetched = self.fetched,
            inserted = self.inserted,
            updated = self.updated,
            failed = self.failed,
            skipped = self.skipped,
            restocks = self.restocks,
            delisted = self.delisted,
            relisted = self.relisted,
            exit_code = self.exit_code(),
            "crawl finished"
        );
    }
}

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Pause before every page fetch.
    pub request_delay: Duration,
    /// Cap on pages fetched this run; entries past the cap count as skipped.
    pub max_products: Option<usize>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            request_delay: Duration::from_secs(2),
            max_products: None,
        }
    }
}

/// Runs one crawl over a complete sitemap snapshot.
pub struct CrawlDiffer {
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn ProductParser>,
    catalog: Arc<dyn CatalogStore>,
    settings: CrawlSettings,
}

impl CrawlDiffer {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn ProductParser>,
        catalog: Arc<dyn CatalogStore>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            fetcher,
            parser,
            catalog,
            settings,
        }
    }

    /// Process every entry, then reconcile delistings.
    ///
    /// Per-entry failures are counted and skipped. Only failing to load the
    /// starting snapshots aborts the run.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn run(&self, entries: &[SitemapEntry]) -> Result<CrawlReport, StoreError> {
        let started = Instant::now();
        let mut report = CrawlReport {
            sitemap_urls: entries.len() as u64,
            ..CrawlReport::default()
        };

        let updated_dates = self.catalog.updated_dates().await?;
        let mut availability = self.catalog.availability_snapshot().await?;

        for entry in entries {
            if !needs_scrape(entry, &updated_dates) {
                report.skipped += 1;
                continue;
            }
            if self
                .settings
                .max_products
                .is_some_and(|max| report.fetched as usize >= max)
            {
                report.skipped += 1;
                continue;
            }

            // The sitemap requests that came before hit the same host.
            tokio::time::sleep(self.settings.request_delay).await;

            report.fetched += 1;
            self.process_entry(entry, &mut availability, &mut report, Utc::now())
                .await;
        }

        if entries.is_empty() {
            warn!("sitemap produced no entries; skipping reconciliation");
        } else {
            let sitemap_skus: HashSet<Sku> = entries.iter().map(|e| e.sku.clone()).collect();
            match reconcile::reconcile(self.catalog.as_ref(), &sitemap_skus, Utc::now()).await {
                Ok(outcome) => {
                    report.delisted = outcome.delisted;
                    report.relisted = outcome.relisted;
                }
                Err(e) => warn!(error = %e, "reconciliation failed; skipped for this run"),
            }
        }

        report.duration = started.elapsed();
        Ok(report)
    }

    async fn process_entry(
        &self,
        entry: &SitemapEntry,
        availability: &mut HashMap<Sku, Option<bool>>,
        report: &mut CrawlReport,
        now: DateTime<Utc>,
    ) {
        let html = match self.fetcher.fetch(&entry.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(sku = %entry.sku, error = %e, "fetch failed");
                report.failed += 1;
                return;
            }
        };

        let record = match self.parser.parse(&html, &entry.url) {
            Ok(record) => record,
            Err(e) => {
                warn!(sku = %entry.sku, error = %e, "parse failed");
                report.failed += 1;
                return;
            }
        };

        let previous = availability.get(&record.sku).copied().flatten();
        let restock = is_restock(previous, record.availability);

        match self.catalog.save_scrape(&record, restock, now).await {
            Ok(outcome) => {
                match outcome.kind {
                    UpsertKind::Inserted => report.inserted += 1,
                    UpsertKind::Updated => report.updated += 1,
                }
                if let Some(event_id) = outcome.restock_event {
                    report.restocks += 1;
                    info!(sku = %record.sku, event_id = %event_id, "restock detected");
                }
                availability.insert(record.sku.clone(), record.availability);
                debug!(sku = %record.sku, kind = ?outcome.kind, "product saved");
            }
            Err(e) => {
                warn!(sku = %record.sku, error = %e, "save failed; rolled back");
                report.failed += 1;
            }
        }
    }
}
