//! Per-page results collected by the coordinator

use crate::record::YearToken;
use crate::storage::BatchWrite;
use std::fmt;

/// Category of a page-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Transport failure or non-success status
    Fetch,
    /// Markup did not have the expected structure
    Extraction,
    /// Writing the batch to the store failed
    Storage,
    /// The run was cancelled before the page was fetched
    Cancelled,
    /// The page task panicked
    Panicked,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extraction => "extraction",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A year/page unit that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub year: YearToken,
    /// `None` when the page count for the whole year could not be determined
    pub page: Option<u32>,
    pub kind: FailureKind,
    pub detail: String,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(
                f,
                "year {} page {}: {} ({})",
                self.year, page, self.kind, self.detail
            ),
            None => write!(
                f,
                "year {} (page count): {} ({})",
                self.year, self.kind, self.detail
            ),
        }
    }
}

/// What one page task produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Batch written; `rejected` rows were dropped for bad dates
    Persisted {
        write: BatchWrite,
        rejected: usize,
        skipped_rows: usize,
    },
    /// No accident table on the page; nothing to write
    TableMissing,
    Failed(PageFailure),
}
