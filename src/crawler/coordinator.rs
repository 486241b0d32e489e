//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the run loop that ties the other crawler pieces
//! together:
//! - Resolving the year set from the resume cursor or year discovery
//! - Counting pages for each year, one year at a time
//! - Fanning out page tasks under the concurrency ceiling
//! - Persisting each page's batch as soon as its task finishes
//! - Aggregating page failures into the run report

use crate::config::Config;
use crate::crawler::discovery::{count_pages, YearListing};
use crate::crawler::fetcher::SiteClient;
use crate::crawler::parser::extract_rows;
use crate::crawler::resume::{order_years, resolve_years, ResumeCursor};
use crate::crawler::scheduler::PageScheduler;
use crate::output::CrawlReport;
use crate::record::{from_rows, YearToken};
use crate::state::{CrawlPhase, FailureKind, PageFailure, PageOutcome, PhaseTracker};
use crate::storage::{open_storage, RunStatus, SqliteStorage, Storage, StorageError, WriteMode};
use crate::HarvestError;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Main crawler coordinator structure
///
/// A coordinator drives exactly one run; construct a new one per run.
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    client: SiteClient,
    scheduler: PageScheduler,
    phase: PhaseTracker,
    config_hash: String,
}

/// Everything a page task needs, cloned into each task
#[derive(Clone)]
struct PageContext {
    client: SiteClient,
    scheduler: PageScheduler,
    storage: Arc<Mutex<SqliteStorage>>,
    fail_fast: bool,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `config_hash` - Hash of the configuration file, recorded with the run
    /// * `cancel` - Token that stops the run when cancelled
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Store opened and HTTP client built
    /// * `Err(HarvestError)` - Failed to initialize
    pub fn new(
        config: Config,
        config_hash: String,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        let mode = WriteMode::from_deduplicate(config.output.deduplicate);
        let storage = open_storage(Path::new(&config.output.database_path), mode)?;
        let client = SiteClient::from_config(&config)?;
        let scheduler = PageScheduler::new(config.crawler.max_concurrent_pages, cancel);

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            client,
            scheduler,
            phase: PhaseTracker::new(),
            config_hash,
        })
    }

    /// Current phase of the run
    pub fn phase(&self) -> CrawlPhase {
        self.phase.current()
    }

    /// Runs the crawl to completion
    ///
    /// Page failures are collected into the report and do not stop the run,
    /// unless `fail-fast` is set, in which case the first one aborts it with
    /// `HarvestError::Aborted`. Either way the run row is finished with the
    /// totals gathered so far.
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        let run_id = lock_storage(&self.storage)?.create_run(&self.config_hash)?;
        tracing::info!("Starting crawl run {}", run_id);

        let start_time = std::time::Instant::now();
        let mut report = CrawlReport::new(run_id);
        let result = self.crawl(&mut report).await;

        let status = match &result {
            Err(_) => RunStatus::Aborted,
            Ok(()) if report.cancelled => RunStatus::Cancelled,
            Ok(()) => RunStatus::Completed,
        };
        let finished = lock_storage(&self.storage)
            .and_then(|mut storage| storage.finish_run(run_id, status, &report.totals()));

        match (result, finished) {
            (Ok(()), Ok(())) => {
                tracing::info!(
                    "Crawl {}: {} pages, {} records inserted, {} updated, {} failures in {:?}",
                    status.to_db_string(),
                    report.pages_ok,
                    report.records_inserted,
                    report.records_updated,
                    report.failures.len(),
                    start_time.elapsed()
                );
                Ok(report)
            }
            (Ok(()), Err(e)) => Err(e.into()),
            (Err(e), finished) => {
                if let Err(finish_err) = finished {
                    tracing::error!("Failed to record aborted run {}: {}", run_id, finish_err);
                }
                Err(e)
            }
        }
    }

    async fn crawl(&mut self, report: &mut CrawlReport) -> Result<(), HarvestError> {
        self.phase.advance(CrawlPhase::ResolvingYears)?;

        let cursor = {
            let storage = lock_storage(&self.storage)?;
            ResumeCursor::from_storage(&*storage)?
        };
        let upper_bound = self.config.crawler.resume_upper_bound_year;
        let years = order_years(resolve_years(cursor, &self.client, upper_bound).await?);
        report.years = years.len();

        if years.is_empty() {
            tracing::info!("No years to process");
        }

        for year in &years {
            if self.scheduler.is_cancelled() {
                tracing::info!("Shutdown requested, stopping before {}", year);
                report.cancelled = true;
                break;
            }

            self.phase.advance(CrawlPhase::CountingPages)?;
            let cancel = self.scheduler.cancel_token();
            let counted = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                counted = count_pages(&self.client, year) => Some(counted),
            };

            let listing = match counted {
                None => {
                    tracing::info!("Shutdown requested while counting pages for {}", year);
                    report.cancelled = true;
                    break;
                }
                Some(Ok(listing)) => listing,
                Some(Err(e)) => {
                    let failure = PageFailure {
                        year: year.clone(),
                        page: None,
                        kind: failure_kind(&e),
                        detail: e.to_string(),
                    };
                    tracing::warn!("Skipping {}: {}", year, failure);
                    let message = failure.to_string();
                    report.record(PageOutcome::Failed(failure));
                    if self.config.crawler.fail_fast {
                        self.scheduler.cancel();
                        return Err(HarvestError::Aborted(message));
                    }
                    self.phase.advance(CrawlPhase::Persisted)?;
                    continue;
                }
            };

            self.phase.advance(CrawlPhase::FetchingPages)?;
            let first_failure = self.fetch_year(year, listing, report).await;
            self.phase.advance(CrawlPhase::Persisted)?;

            if let Some(message) = first_failure {
                return Err(HarvestError::Aborted(message));
            }
            if self.scheduler.is_cancelled() {
                report.cancelled = true;
                break;
            }
        }

        self.phase.advance(CrawlPhase::Done)?;
        Ok(())
    }

    /// Runs every page task of one year and waits for all of them
    ///
    /// Page 1 reuses the markup fetched while counting pages. Returns the
    /// first failure when `fail-fast` stopped the year early.
    async fn fetch_year(
        &self,
        year: &YearToken,
        listing: YearListing,
        report: &mut CrawlReport,
    ) -> Option<String> {
        let ctx = PageContext {
            client: self.client.clone(),
            scheduler: self.scheduler.clone(),
            storage: Arc::clone(&self.storage),
            fail_fast: self.config.crawler.fail_fast,
        };
        let pages = listing.pages;
        let mut first_page = Some(listing.first_page);

        let mut tasks = JoinSet::new();
        let mut pending: BTreeSet<u32> = (1..=pages).collect();
        for page in 1..=pages {
            let ctx = ctx.clone();
            let year = year.clone();
            let prefetched = if page == 1 { first_page.take() } else { None };
            tasks.spawn(async move { (page, process_page(ctx, year, page, prefetched).await) });
        }

        let failures_before = report.failures.len();
        let mut first_failure = None;

        while let Some(joined) = tasks.join_next().await {
            let (page, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!("Page task for {} failed to join: {}", year, e);
                    continue;
                }
            };
            pending.remove(&page);

            if let PageOutcome::Failed(failure) = &outcome {
                if failure.kind != FailureKind::Cancelled {
                    tracing::warn!("Page failed: {}", failure);
                    if self.config.crawler.fail_fast && first_failure.is_none() {
                        first_failure = Some(failure.to_string());
                        self.scheduler.cancel();
                    }
                }
            }
            report.record(outcome);
        }

        // Pages that never reported back panicked inside their task
        for page in pending {
            report.record(PageOutcome::Failed(PageFailure {
                year: year.clone(),
                page: Some(page),
                kind: FailureKind::Panicked,
                detail: "page task panicked".to_string(),
            }));
        }

        tracing::info!(
            "Finished {} ({} pages, {} failed)",
            year,
            pages,
            report.failures.len() - failures_before
        );

        first_failure
    }
}

/// Fetches, extracts, normalizes and persists one listing page
///
/// `prefetched` carries markup that is already in hand; no permit is taken
/// for it.
async fn process_page(
    ctx: PageContext,
    year: YearToken,
    page: u32,
    prefetched: Option<String>,
) -> PageOutcome {
    let html = match prefetched {
        Some(html) => html,
        None => match fetch_page(&ctx, &year, page).await {
            Ok(html) => html,
            Err(outcome) => return outcome,
        },
    };

    let table = match extract_rows(&html) {
        Ok(table) => table,
        Err(e) if e.is_soft() => {
            tracing::warn!("{} page {}: {}", year, page, e);
            tracing::debug!("Markup without accident table: {}", html);
            return PageOutcome::TableMissing;
        }
        Err(e) => return failed(&year, page, FailureKind::Extraction, e.to_string()),
    };

    let skipped_rows = table.skipped_rows;
    let batch = from_rows(table.rows);
    let rejected = batch.rejected;

    let storage = Arc::clone(&ctx.storage);
    let written = tokio::task::spawn_blocking(move || {
        let mut storage = lock_storage(&storage)?;
        storage.append_batch(&batch.records)
    })
    .await;

    match written {
        Ok(Ok(write)) => {
            tracing::debug!(
                "{} page {}: {} records inserted, {} updated, {} rejected, {} rows skipped",
                year,
                page,
                write.inserted,
                write.updated,
                rejected,
                skipped_rows
            );
            PageOutcome::Persisted {
                write,
                rejected,
                skipped_rows,
            }
        }
        Ok(Err(e)) => failed(&year, page, FailureKind::Storage, e.to_string()),
        Err(e) => failed(&year, page, FailureKind::Panicked, e.to_string()),
    }
}

/// Fetches one listing page under a scheduler permit
///
/// With `fail-fast` a failed fetch cancels the run while the permit is still
/// held, so no waiting page can take the slot and start another request.
async fn fetch_page(
    ctx: &PageContext,
    year: &YearToken,
    page: u32,
) -> Result<String, PageOutcome> {
    let Some(permit) = ctx.scheduler.acquire().await else {
        return Err(failed(year, page, FailureKind::Cancelled, "run cancelled before fetch"));
    };

    let fetched = ctx.client.fetch_listing(year, page).await;
    if fetched.is_err() && ctx.fail_fast {
        ctx.scheduler.cancel();
    }
    drop(permit);

    fetched.map_err(|e| failed(year, page, FailureKind::Fetch, e.to_string()))
}

fn failed(
    year: &YearToken,
    page: u32,
    kind: FailureKind,
    detail: impl Into<String>,
) -> PageOutcome {
    PageOutcome::Failed(PageFailure {
        year: year.clone(),
        page: Some(page),
        kind,
        detail: detail.into(),
    })
}

fn failure_kind(err: &HarvestError) -> FailureKind {
    match err {
        HarvestError::Extraction(_) => FailureKind::Extraction,
        HarvestError::Storage(_) => FailureKind::Storage,
        _ => FailureKind::Fetch,
    }
}

/// Locks the shared store, mapping a poisoned lock to a storage error
fn lock_storage(
    storage: &Mutex<SqliteStorage>,
) -> Result<MutexGuard<'_, SqliteStorage>, StorageError> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// Runs a complete crawl with the given configuration
///
/// # Arguments
///
/// * `config` - Validated configuration
/// * `config_hash` - Hash recorded with the run
/// * `cancel` - Token that stops the run between page tasks and years
pub async fn run_crawl(
    config: Config,
    config_hash: String,
    cancel: CancellationToken,
) -> Result<CrawlReport, HarvestError> {
    let mut coordinator = Coordinator::new(config, config_hash, cancel)?;
    coordinator.run().await
}
