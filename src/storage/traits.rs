//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::record::AccidentRecord;
use crate::storage::{BatchWrite, RunRecord, RunStatus, RunTotals};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Rows are never deleted. Whether a repeated write of the same record
/// creates a duplicate row depends on the backend's
/// [`WriteMode`](crate::storage::WriteMode); in upsert mode a re-crawled
/// record only refreshes its non-key fields.
pub trait Storage {
    // ===== Accident Records =====

    /// Writes one page's records as a single atomic batch
    ///
    /// # Returns
    ///
    /// How many rows were inserted and how many existing rows changed.
    /// Records identical to a stored row count as neither.
    fn append_batch(&mut self, records: &[AccidentRecord]) -> StorageResult<BatchWrite>;

    /// Gets the latest accident date in the store, if any
    fn max_date(&self) -> StorageResult<Option<NaiveDate>>;

    /// Gets the earliest and latest accident dates in the store
    fn date_range(&self) -> StorageResult<Option<(NaiveDate, NaiveDate)>>;

    /// Counts all stored records
    fn count_records(&self) -> StorageResult<u64>;

    /// Counts records per calendar year, ascending by year
    fn count_by_year(&self) -> StorageResult<Vec<(i32, u64)>>;

    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Marks a run as finished with its final status and totals
    fn finish_run(&mut self, run_id: i64, status: RunStatus, totals: &RunTotals)
        -> StorageResult<()>;
}
