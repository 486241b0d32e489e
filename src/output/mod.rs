//! Output module for run reports and store statistics
//!
//! This module handles:
//! - Aggregating per-page outcomes into a run report
//! - Printing the report at the end of a run
//! - Summarizing what is already in the store

pub mod stats;

pub use stats::{load_statistics, print_statistics, StoreStatistics};

use crate::state::{FailureKind, PageFailure, PageOutcome};
use crate::storage::RunTotals;

/// What a crawl run did, page by page
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub run_id: i64,
    /// Number of years in the resolved year set
    pub years: usize,
    /// Pages whose batch was persisted, including pages without a table
    pub pages_ok: u64,
    /// Rows added to the store
    pub records_inserted: u64,
    /// Stored rows whose non-key fields were refreshed
    pub records_updated: u64,
    /// Rows dropped because their date did not normalize
    pub records_rejected: u64,
    /// Table rows without exactly eight cells
    pub rows_skipped: u64,
    pub tables_missing: u64,
    pub failures: Vec<PageFailure>,
    /// The run stopped early on a shutdown request
    pub cancelled: bool,
}

impl CrawlReport {
    pub fn new(run_id: i64) -> Self {
        Self {
            run_id,
            ..Self::default()
        }
    }

    /// Folds one page outcome into the report
    pub fn record(&mut self, outcome: PageOutcome) {
        match outcome {
            PageOutcome::Persisted {
                write,
                rejected,
                skipped_rows,
            } => {
                self.pages_ok += 1;
                self.records_inserted += write.inserted as u64;
                self.records_updated += write.updated as u64;
                self.records_rejected += rejected as u64;
                self.rows_skipped += skipped_rows as u64;
            }
            PageOutcome::TableMissing => {
                self.pages_ok += 1;
                self.tables_missing += 1;
            }
            PageOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    /// Failures other than pages skipped by a shutdown request
    pub fn hard_failures(&self) -> impl Iterator<Item = &PageFailure> {
        self.failures
            .iter()
            .filter(|f| f.kind != FailureKind::Cancelled)
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Counters stored with the run row
    pub fn totals(&self) -> RunTotals {
        RunTotals {
            pages_ok: self.pages_ok,
            pages_failed: self.failures.len() as u64,
            records_inserted: self.records_inserted,
            records_updated: self.records_updated,
        }
    }
}

/// Prints a run report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Run {} ===\n", report.run_id);

    println!("Years processed: {}", report.years);
    println!("Pages persisted: {}", report.pages_ok);
    println!("Records inserted: {}", report.records_inserted);
    if report.records_updated > 0 {
        println!("Records updated: {}", report.records_updated);
    }
    println!("Rows rejected (bad date): {}", report.records_rejected);
    println!("Rows skipped (wrong width): {}", report.rows_skipped);
    if report.tables_missing > 0 {
        println!("Pages without a table: {}", report.tables_missing);
    }
    println!();

    if report.failures.is_empty() {
        println!("No page failures");
    } else {
        println!("Failed units ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  - {}", failure);
        }
    }

    if report.cancelled {
        println!("\nRun was cancelled before completion");
    }
}
